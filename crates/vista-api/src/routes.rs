use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, chat, items};

/// API routes, without prefix, static files or transport layers.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/items", post(items::create_item).get(items::list_items));

    let protected_routes = Router::new()
        .route("/multimodal-chat", post(chat::multimodal_chat))
        .route("/multimodal-chat/history", get(chat::history))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public_routes.merge(protected_routes).with_state(state)
}

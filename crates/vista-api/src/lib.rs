pub mod auth;
pub mod chat;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod images;
pub mod items;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{AppState, AppStateInner};

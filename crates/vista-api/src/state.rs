use std::sync::Arc;

use tracing::error;

use vista_ai::Orchestrator;
use vista_db::Database;

use crate::credentials::Credentials;
use crate::error::ApiError;
use crate::images::ImageStore;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler needs, built once at startup.
pub struct AppStateInner {
    pub db: Database,
    pub credentials: Credentials,
    pub images: ImageStore,
    pub orchestrator: Orchestrator,
}

/// Run blocking work (SQLite, password hashing) off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}

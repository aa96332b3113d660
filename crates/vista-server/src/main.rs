mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, extract::DefaultBodyLimit, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use vista_ai::Orchestrator;
use vista_ai::gemini::{GeminiClient, GeminiLanguage, GeminiMultimodal, GeminiVision};
use vista_api::credentials::Credentials;
use vista_api::images::ImageStore;
use vista_api::{AppState, AppStateInner};
use vista_db::Database;

use crate::config::{GeminiBackend, Settings};

/// Public mount point for stored uploads.
const IMAGE_URL_PREFIX: &str = "/static/images";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vista=debug,vista_api=debug,vista_ai=debug,vista_db=info,tower_http=debug".into()
            }),
        )
        .init();

    // Config
    let settings = Settings::from_env()?;

    // Init database
    let db = Database::open(&settings.database_path)?;

    let credentials = Credentials::new(
        &settings.jwt_secret,
        settings.jwt_algorithm,
        settings.token_ttl,
    );
    let images = ImageStore::new(settings.image_dir.clone(), IMAGE_URL_PREFIX).await?;
    let orchestrator = build_orchestrator(&settings);

    info!(
        "Models: vision={} language={} ({:?})",
        orchestrator.vision_model(),
        orchestrator.language_model(),
        settings.gemini.backend
    );

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        credentials,
        images,
        orchestrator,
    });

    let app = build_app(&settings, state);

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!("{} listening on {}", settings.project_name, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_orchestrator(settings: &Settings) -> Orchestrator {
    let gemini = &settings.gemini;
    let client = GeminiClient::new(&gemini.api_key, &gemini.base_url);

    match gemini.backend {
        GeminiBackend::Split => Orchestrator::new(
            Arc::new(GeminiVision::new(client.clone(), &gemini.vlm_model)),
            Arc::new(GeminiLanguage::new(client, &gemini.llm_model)),
        ),
        GeminiBackend::Unified => {
            let model = Arc::new(GeminiMultimodal::new(client, &gemini.llm_model));
            Orchestrator::new(model.clone(), model)
        }
    }
}

fn build_app(settings: &Settings, state: AppState) -> Router {
    let api = vista_api::router(state);
    let welcome = format!("Welcome to {}", settings.project_name);

    let app = Router::new().route(
        "/",
        get(move || {
            let message = welcome.clone();
            async move { Json(serde_json::json!({ "message": message })) }
        }),
    );

    // axum refuses to nest at the root
    let app = if settings.api_prefix.is_empty() {
        app.merge(api)
    } else {
        app.nest(&settings.api_prefix, api)
    };

    app.nest_service(IMAGE_URL_PREFIX, ServeDir::new(&settings.image_dir))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn app_with(image_dir: &std::path::Path, prefix: &str) -> Router {
        let dir = image_dir.to_string_lossy().into_owned();
        let settings = Settings::from_lookup(|key| match key {
            "VISTA_JWT_SECRET" => Some("test-secret".into()),
            "GEMINI_API_KEY" => Some("unused".into()),
            "GEMINI_BASE_URL" => Some("http://127.0.0.1:9".into()),
            "VISTA_IMAGE_DIR" => Some(dir.clone()),
            "VISTA_API_PREFIX" => Some(prefix.into()),
            _ => None,
        })
        .unwrap();

        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            credentials: Credentials::new(&settings.jwt_secret, settings.jwt_algorithm, settings.token_ttl),
            images: ImageStore::new(settings.image_dir.clone(), IMAGE_URL_PREFIX).await.unwrap(),
            orchestrator: build_orchestrator(&settings),
        });
        build_app(&settings, state)
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        (status, to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec())
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("vista-server-{}-{tag}", std::process::id()))
    }

    #[tokio::test]
    async fn welcome_and_prefixed_api() {
        let dir = temp_dir("welcome");
        let app = app_with(&dir, "/api/v1").await;

        let (status, body) = fetch(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Welcome to Vista");

        let (status, body) = fetch(app.clone(), "/api/v1/items").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"[]");

        let (status, _) = fetch(app, "/items").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn root_prefix_merges_routes() {
        let dir = temp_dir("root");
        let app = app_with(&dir, "/").await;

        let (status, _) = fetch(app, "/items").await;
        assert_eq!(status, StatusCode::OK);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn stored_images_are_served() {
        let dir = temp_dir("static");
        let app = app_with(&dir, "/api/v1").await;
        std::fs::write(dir.join("abc_ball.png"), b"\x89PNG").unwrap();

        let (status, body) = fetch(app, "/static/images/abc_ball.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"\x89PNG");

        std::fs::remove_dir_all(dir).ok();
    }
}

//! Lineseek REST API
//!
//! HTTP layer over the line service, built with Axum.
//!
//! # Endpoints
//!
//! ## Lines
//! - `GET /lines/:index` - Record at a 0-based index, as `text/plain`
//!
//! | Outcome                      | Status |
//! |------------------------------|--------|
//! | record found                 | 200    |
//! | negative or past end of file | 413    |
//! | index is not an integer      | 400    |
//! | cache store unreachable      | 503    |
//! | request timeout elapsed      | 504    |
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use lineseek::api::{serve, AppState};
//! use lineseek::{Config, LineService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let service = Arc::new(LineService::open(&config).await?);
//!
//!     let state = AppState::new(service, &config.api);
//!     serve(state, &config.api).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use crate::config::ApiConfig;
use axum::{response::Redirect, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(|| async { Redirect::temporary("/health") }))
        .route("/lines/:index", get(routes::lines::get_line))
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Lineseek API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Lineseek API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StoreKind};
    use crate::prewarm::PrewarmJob;
    use crate::service::LineService;
    use crate::store::testing::UnreachableStore;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};
    use tower::util::ServiceExt;

    fn test_config(dir: &TempDir, content: &str) -> Config {
        let path = dir.path().join("data.txt");
        std::fs::write(&path, content).unwrap();

        let mut config = Config::default();
        config.file.path = path;
        config.index.chunk_size = 2;
        config.index.backoff_ms = 20;
        config.store.kind = StoreKind::Memory;
        config
    }

    async fn create_test_state(content: &str) -> (AppState, TempDir) {
        let dir = tempdir().unwrap();
        let config = test_config(&dir, content);
        let service = Arc::new(LineService::open(&config).await.unwrap());
        (AppState::new(service, &config.api), dir)
    }

    async fn create_test_app() -> (Router, TempDir) {
        let (state, dir) = create_test_state("a\nbb\nccc\n").await;
        (build_router(state), dir)
    }

    async fn request(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn error_code(response: axum::response::Response) -> String {
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(body["request_id"].is_string());
        body["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_get_line() {
        let (app, _dir) = create_test_app().await;

        let response = request(app, "/lines/1").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_bytes(response).await, b"bb");
    }

    #[tokio::test]
    async fn test_past_end_is_out_of_range() {
        let (app, _dir) = create_test_app().await;

        let response = request(app, "/lines/3").await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["error"]["message"], "Line index out of range");
    }

    #[tokio::test]
    async fn test_negative_is_out_of_range() {
        let (app, _dir) = create_test_app().await;

        let response = request(app, "/lines/-5").await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(error_code(response).await, "OUT_OF_RANGE");
    }

    #[tokio::test]
    async fn test_non_numeric_index() {
        let (app, _dir) = create_test_app().await;

        let response = request(app, "/lines/abc").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "INVALID_INDEX");
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let dir = tempdir().unwrap();
        let config = test_config(&dir, "a\n");
        let service = LineService::with_store(&config, Arc::new(UnreachableStore))
            .await
            .unwrap();
        let app = build_router(AppState::new(Arc::new(service), &config.api));

        let response = request(app.clone(), "/lines/0").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error_code(response).await, "SERVICE_UNAVAILABLE");

        let response = request(app, "/health/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_timeout_while_build_lock_is_held() {
        let (state, _dir) = create_test_state("a\nbb\nccc\n").await;
        let state = state.with_request_timeout(Duration::from_millis(100));

        // Another worker is mid-scan and never finishes within the request
        let lock = state
            .service
            .builder()
            .coordinator()
            .try_acquire(0)
            .await
            .unwrap()
            .unwrap();

        let response = request(build_router(state), "/lines/0").await;
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error_code(response).await, "TIMEOUT");

        lock.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_root_redirects_to_health() {
        let (app, _dir) = create_test_app().await;

        let response = request(app, "/").await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/health");
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _dir) = create_test_app().await;
        assert_eq!(request(app, "/health/live").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let (app, _dir) = create_test_app().await;
        assert_eq!(request(app, "/health/ready").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (state, _dir) = create_test_state("a\nbb\nccc\n").await;
        let job = Arc::new(PrewarmJob::new(Arc::clone(&state.service), Duration::ZERO));
        job.run_once().await;
        let app = build_router(state.with_prewarm(job));

        let response = request(app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store_backend"], "memory");
        assert_eq!(body["chunk_size"], 2);
        assert_eq!(body["index"]["frontier"], 2);
        assert_eq!(body["prewarm"]["outcome"]["status"], "complete");
    }
}

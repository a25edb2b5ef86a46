//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (cache store reachable)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Kubernetes readiness probe.
/// Returns 200 if the cache store answers a ping.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match check_store_health(&state).await {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with index and cache details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_ok = check_store_health(&state).await;

    let stats = match state.service.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!("Failed to collect service stats: {}", e);
            None
        }
    };

    let prewarm = match &state.prewarm {
        Some(job) => Some(job.status().await),
        None => None,
    };

    let overall_status = if store_ok && stats.is_some() {
        "healthy"
    } else {
        "unhealthy"
    };

    let layout = state.service.builder().layout();

    Json(HealthResponse {
        status: overall_status.to_string(),
        store: if store_ok { "ok" } else { "error" }.to_string(),
        store_backend: state.service.store().name().to_string(),
        file: state.service.builder().path().display().to_string(),
        chunk_size: layout.chunk_size(),
        index: stats.as_ref().map(|s| s.index.clone()),
        cache: stats.map(|s| s.cache),
        prewarm,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn check_store_health(state: &AppState) -> bool {
    match state.service.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Cache store ping failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}

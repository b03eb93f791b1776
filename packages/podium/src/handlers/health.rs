use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns server status
///
/// Error counters are cumulative and live in `/metrics`; they do not affect
/// the status here.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.broker.registry.len().await as u64;
    let metrics = state.metrics.snapshot();

    let (code, status) = if state.shutdown.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else {
        (StatusCode::OK, "healthy")
    };

    let body = Json(metrics::HealthStatus {
        status: status.to_string(),
        connections: metrics.connections.active,
        sessions,
        uptime_secs: metrics.uptime_secs,
    });
    (code, body)
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

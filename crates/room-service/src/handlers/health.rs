//! Health check handler.
//!
//! Reports store connectivity and the number of connected waiters.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Handler for GET /health
///
/// Returns 200 when the store answers, 503 otherwise. The store error is
/// logged, not returned.
#[tracing::instrument(skip_all, name = "room.health")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let waiters = state.bus.total_waiters();

    match state.owners.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                database: Some("healthy".to_string()),
                waiters,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "room.handlers.health", error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    database: Some("unhealthy".to_string()),
                    waiters,
                }),
            )
        }
    }
}

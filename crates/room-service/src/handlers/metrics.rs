//! Prometheus metrics endpoint.
//!
//! Unauthenticated scrape target. Labels are bounded; no slugs, owner ids
//! or URLs are recorded.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
#[tracing::instrument(skip_all, name = "room.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

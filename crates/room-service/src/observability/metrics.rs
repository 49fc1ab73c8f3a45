//! Metrics definitions for the room service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `room_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Slugs and owner IDs are never used as labels. Labels are bounded:
//! - `outcome`: delivered, failed
//! - `error_type`: bounded by `RoomError` variants
//! - `reason`: disconnected
//! - `status`: success, error

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder.
///
/// Must be called once at startup, before any metric is recorded.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Provider round trips: token exchange plus event insert
        .set_buckets_for_metric(
            Matcher::Prefix("room_provisioning_duration".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set provisioning buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Record a successful provisioning episode.
///
/// Metric: `room_meetings_provisioned_total`
pub fn record_meeting_provisioned() {
    counter!("room_meetings_provisioned_total").increment(1);
}

/// Record a failed provisioning attempt.
///
/// Metric: `room_provisioning_failures_total`
pub fn record_provisioning_failure() {
    counter!("room_provisioning_failures_total").increment(1);
}

/// Record how long a provisioner call took.
///
/// Metric: `room_provisioning_duration_seconds`
/// Labels: `status`
pub fn record_provisioning_duration(success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    histogram!("room_provisioning_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}

// ============================================================================
// Notification Bus Metrics
// ============================================================================

/// Record one broadcast pass and its per-waiter outcomes.
///
/// Metrics: `room_broadcasts_total`, `room_broadcast_deliveries_total`
/// Labels: `event`, `outcome`
pub fn record_broadcast(event: &'static str, delivered: usize, failed: usize) {
    counter!("room_broadcasts_total", "event" => event).increment(1);

    counter!("room_broadcast_deliveries_total", "outcome" => "delivered")
        .increment(delivered as u64);
    counter!("room_broadcast_deliveries_total", "outcome" => "failed").increment(failed as u64);
}

/// Record a waiter leaving the registry.
///
/// Metric: `room_waiters_removed_total`
/// Labels: `reason`
pub fn record_waiter_removed(reason: &'static str) {
    counter!("room_waiters_removed_total", "reason" => reason).increment(1);
}

/// Set the number of waiters currently registered across all channels.
///
/// Metric: `room_waiters_active`
pub fn set_active_waiters(count: usize) {
    gauge!("room_waiters_active").set(count as f64);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record an error returned to a client.
///
/// Metric: `room_http_errors_total`
/// Labels: `error_type`, `status_code`
pub fn record_error(error_type: &'static str, status_code: u16) {
    counter!("room_http_errors_total",
        "error_type" => error_type,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

//! Observability for the room service.
//!
//! Metrics are recorded through the `metrics` facade and exported by
//! `metrics-exporter-prometheus` at `/metrics`.

pub mod metrics;

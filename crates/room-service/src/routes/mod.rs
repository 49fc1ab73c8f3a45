//! HTTP routes for the room service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{resolve_session, SessionSigner};
use crate::repositories::{OwnerStore, WaitingSessionStore};
use crate::services::{NotificationBus, RoomService};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Owner store (room lookup and health ping).
    pub owners: Arc<dyn OwnerStore>,

    /// Best-effort log of waiting visitors.
    pub waiting_sessions: Arc<dyn WaitingSessionStore>,

    /// Room decisions and waiter admission.
    pub rooms: RoomService,

    /// Waiting-room channel registry.
    pub bus: Arc<NotificationBus>,

    /// Owner session cookie verification.
    pub sessions: Arc<SessionSigner>,
}

/// Build the application routes.
///
/// - `/health` - store connectivity and waiter count
/// - `/metrics` - Prometheus scrape
/// - `/:slug` - redirect to the active meeting or serve the waiting room
/// - `/api/wait/:slug/stream` - waiting-room event stream
///
/// The timeout covers producing the response head only, so open event
/// streams are not cut off by it.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let ops_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let room_routes = Router::new()
        .route("/:slug", get(handlers::open_room))
        .route("/api/wait/:slug/stream", get(handlers::wait_stream))
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            resolve_session,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    ops_routes
        .merge(metrics_routes)
        .merge(room_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
}

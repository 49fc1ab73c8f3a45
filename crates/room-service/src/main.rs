//! Room Service
//!
//! Serves personal meeting rooms and their waiting-room streams.

use chrono::Duration as ChronoDuration;
use common::secret::ExposeSecret;
use room_service::config::Config;
use room_service::middleware::SessionSigner;
use room_service::observability::metrics::init_metrics_recorder;
use room_service::repositories::{
    PgMeetingsRepository, PgOwnersRepository, PgWaitingSessionsRepository,
};
use room_service::routes::{self, AppState};
use room_service::services::{
    CredentialCipher, GoogleMeetProvisioner, GoogleMeetSettings, LifecycleManager,
    NotificationBus, RoomService, SystemClock,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Length of the calendar event wrapping each provisioned conference.
const CALENDAR_EVENT_LENGTH_MINUTES: i64 = 60;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        meet_window_ms = config.meet_window_ms,
        waiter_keepalive_seconds = config.waiter_keepalive_seconds,
        "Configuration loaded successfully"
    );

    // Metrics recorder must exist before anything records
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    info!("Connecting to database...");
    let db_url_with_timeout = add_query_timeout(&config.database_url, 5);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    let cipher = CredentialCipher::new(config.credential_key.expose_secret()).map_err(|e| {
        error!("Failed to initialize credential cipher: {}", e);
        e
    })?;

    let meet_window_ms = i64::try_from(config.meet_window_ms)?;
    let provisioner = GoogleMeetProvisioner::new(
        GoogleMeetSettings {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            token_url: config.google_token_url.clone(),
            calendar_url: config.google_calendar_url.clone(),
            event_length: ChronoDuration::minutes(CALENDAR_EVENT_LENGTH_MINUTES),
        },
        cipher,
    )?;

    let owners = Arc::new(PgOwnersRepository::new(db_pool.clone()));
    let meetings = Arc::new(PgMeetingsRepository::new(db_pool.clone()));
    let waiting_sessions = Arc::new(PgWaitingSessionsRepository::new(db_pool));

    let bus = Arc::new(NotificationBus::new(Duration::from_secs(
        config.waiter_keepalive_seconds,
    )));
    let lifecycle = LifecycleManager::new(
        meetings,
        Arc::new(provisioner),
        Arc::new(SystemClock),
        ChronoDuration::milliseconds(meet_window_ms),
    );
    let rooms = RoomService::new(owners.clone(), lifecycle, bus.clone());
    let sessions = Arc::new(SessionSigner::new(&config.session_secret));

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        owners,
        waiting_sessions,
        rooms,
        bus: bus.clone(),
        sessions,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Room Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(bus))
    .await?;

    info!("Room Service shutdown complete");

    Ok(())
}

/// Waits for SIGTERM or SIGINT, closes every waiting-room stream, then
/// drains for `ROOM_DRAIN_SECONDS` (default 30).
async fn shutdown_signal(bus: Arc<NotificationBus>) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    // Open streams would otherwise hold the server open until the drain ends.
    bus.close_all();

    let drain_secs: u64 = std::env::var("ROOM_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (ROOM_DRAIN_SECONDS=0)");
    }
}

/// Adds statement_timeout to the database URL.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}

//! Test server harness for E2E testing
//!
//! Provides `TestRoomServer` for spawning real room service instances in
//! tests. Stores are in-memory, the clock is manual and the meeting provider
//! is a mock, so no database or network access is needed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{TimeZone, Utc};
use common::secret::{ExposeSecret, SecretString};
use common::types::OwnerId;
use metrics_exporter_prometheus::PrometheusBuilder;
use room_service::config::Config;
use room_service::middleware::{SessionSigner, SESSION_COOKIE};
use room_service::models::Owner;
use room_service::repositories::InMemoryStore;
use room_service::routes::{self, AppState};
use room_service::services::clock::mock::ManualClock;
use room_service::services::provisioner::mock::MockProvisioner;
use room_service::services::{
    AccountService, CredentialCipher, LifecycleManager, NotificationBus, RoomService,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Join URL returned by the harness provisioner until changed.
pub const TEST_JOIN_URL: &str = "https://meet.google.com/abc-defg-hij";

/// Meeting window used by the harness (5 minutes).
pub const TEST_MEET_WINDOW_MS: u64 = 300_000;

/// Test harness for spawning the room service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<()> {
///     let server = TestRoomServer::spawn().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRoomServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
    provisioner: Arc<MockProvisioner>,
    accounts: AccountService,
    _handle: JoinHandle<()>,
}

impl TestRoomServer {
    /// Spawn a new test server instance with empty stores.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "MEET_WINDOW_MS".to_string(),
                TEST_MEET_WINDOW_MS.to_string(),
            ),
            (
                "SESSION_SECRET".to_string(),
                "test-session-secret-0123456789abcdef".to_string(),
            ),
            ("CREDENTIAL_KEY".to_string(), STANDARD.encode([7u8; 32])),
            ("GOOGLE_CLIENT_ID".to_string(), "test-client".to_string()),
            ("GOOGLE_CLIENT_SECRET".to_string(), "test-secret".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
                .single()
                .ok_or_else(|| anyhow::anyhow!("Invalid start time"))?,
        ));
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let provisioner = Arc::new(MockProvisioner::succeeding(TEST_JOIN_URL));
        let cipher = CredentialCipher::new(config.credential_key.expose_secret())
            .map_err(|e| anyhow::anyhow!("Failed to create cipher: {}", e))?;

        let bus = Arc::new(NotificationBus::new(Duration::from_secs(
            config.waiter_keepalive_seconds,
        )));
        let meet_window_ms = i64::try_from(config.meet_window_ms)?;
        let lifecycle = LifecycleManager::new(
            store.clone(),
            provisioner.clone(),
            clock.clone(),
            chrono::Duration::milliseconds(meet_window_ms),
        );
        let rooms = RoomService::new(store.clone(), lifecycle, bus.clone());
        let sessions = Arc::new(SessionSigner::new(&config.session_secret));

        let state = Arc::new(AppState {
            config,
            owners: store.clone(),
            waiting_sessions: store.clone(),
            rooms,
            bus,
            sessions,
        });

        // The global recorder belongs to the process; tests only need a handle.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state.clone(), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        let accounts = AccountService::new(store.clone(), cipher);

        Ok(Self {
            addr,
            state,
            store,
            clock,
            provisioner,
            accounts,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared application state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Waiting-room channel registry.
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.state.bus
    }

    /// In-memory owner, meeting and waiting-session store.
    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    /// Clock shared by the store and the lifecycle manager.
    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// Meeting provider mock.
    pub fn provisioner(&self) -> &Arc<MockProvisioner> {
        &self.provisioner
    }

    /// HTTP client that does not follow redirects.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default()
    }

    /// `Cookie` header value carrying a signed session for `owner_id`.
    pub fn owner_cookie(&self, owner_id: OwnerId) -> String {
        format!("{}={}", SESSION_COOKIE, self.state.sessions.sign(owner_id))
    }

    /// Create an owner the way sign-in does, with a sealed test credential.
    pub async fn seed_owner(
        &self,
        display_name: &str,
        email: &str,
    ) -> Result<Owner, anyhow::Error> {
        let refresh_token = SecretString::from("test-refresh-token");
        self.accounts
            .upsert_owner(display_name, email, &refresh_token)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to seed owner: {}", e))
    }

    /// Poll until `slug` has `count` waiters, or give up after five seconds.
    pub async fn wait_for_waiters(&self, slug: &str, count: usize) -> Result<(), anyhow::Error> {
        for _ in 0..500 {
            if self.state.bus.waiter_count(slug) == count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Err(anyhow::anyhow!(
            "Timed out waiting for {} waiters on {}",
            count,
            slug
        ))
    }
}

impl Drop for TestRoomServer {
    fn drop(&mut self) {
        self.state.bus.close_all();
        self._handle.abort();
    }
}

//! Waiting session log.
//!
//! Best-effort record of visitors entering a waiting room. Not on the
//! critical path: callers log and ignore failures.

use crate::errors::RoomError;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

/// Waiting session persistence.
#[async_trait]
pub trait WaitingSessionStore: Send + Sync {
    /// Record that a visitor started waiting on `slug`.
    async fn record_waiting_session(
        &self,
        slug: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), RoomError>;
}

/// PostgreSQL-backed waiting session log.
#[derive(Clone)]
pub struct PgWaitingSessionsRepository {
    pool: PgPool,
}

impl PgWaitingSessionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WaitingSessionStore for PgWaitingSessionsRepository {
    #[instrument(skip_all, fields(slug = %slug))]
    async fn record_waiting_session(
        &self,
        slug: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), RoomError> {
        sqlx::query(
            r#"
            INSERT INTO waiting_sessions (slug, ip, user_agent)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(slug)
        .bind(ip)
        .bind(user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| RoomError::Database(format!("Failed to record waiting session: {}", e)))?;

        Ok(())
    }
}

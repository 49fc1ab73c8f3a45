//! Meeting repository.
//!
//! Meetings are append-only. A row is inserted once per provisioning episode
//! and is never updated or deleted here; it stops being active when
//! `expires_at` passes. Retention is left to the database operator.

use crate::errors::RoomError;
use crate::models::Meeting;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{MeetingId, OwnerId};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// Meeting persistence operations.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Most recently created meeting for `owner_id` with `expires_at > now`.
    async fn find_active_meeting(
        &self,
        owner_id: OwnerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RoomError>;

    /// Persist a newly provisioned meeting.
    ///
    /// A single statement: other requests either see the whole row or none of it.
    async fn insert_meeting(
        &self,
        owner_id: OwnerId,
        join_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Meeting, RoomError>;
}

/// Meeting row as stored in PostgreSQL.
#[derive(sqlx::FromRow)]
struct MeetingRow {
    meeting_id: Uuid,
    owner_id: Uuid,
    join_url: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<MeetingRow> for Meeting {
    fn from(row: MeetingRow) -> Self {
        Meeting {
            meeting_id: MeetingId(row.meeting_id),
            owner_id: OwnerId(row.owner_id),
            join_url: row.join_url,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

/// PostgreSQL-backed meeting store.
#[derive(Clone)]
pub struct PgMeetingsRepository {
    pool: PgPool,
}

impl PgMeetingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MeetingStore for PgMeetingsRepository {
    #[instrument(skip_all, fields(owner_id = %owner_id))]
    async fn find_active_meeting(
        &self,
        owner_id: OwnerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RoomError> {
        // `seq` breaks ties between rows created in the same instant.
        let row = sqlx::query_as::<_, MeetingRow>(
            r#"
            SELECT meeting_id, owner_id, join_url, created_at, expires_at
            FROM meetings
            WHERE owner_id = $1 AND expires_at > $2
            ORDER BY created_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(owner_id.0)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RoomError::Database(format!("Failed to fetch active meeting: {}", e)))?;

        Ok(row.map(Meeting::from))
    }

    #[instrument(skip_all, fields(owner_id = %owner_id, expires_at = %expires_at))]
    async fn insert_meeting(
        &self,
        owner_id: OwnerId,
        join_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Meeting, RoomError> {
        let row = sqlx::query_as::<_, MeetingRow>(
            r#"
            INSERT INTO meetings (meeting_id, owner_id, join_url, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING meeting_id, owner_id, join_url, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id.0)
        .bind(join_url)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RoomError::Database(format!("Failed to insert meeting: {}", e)))?;

        Ok(row.into())
    }
}

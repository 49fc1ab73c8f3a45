//! Room service models.
//!
//! Contains data types used across the room service.

use chrono::{DateTime, Utc};
use common::types::{MeetingId, OwnerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A room owner.
///
/// Owned by the persistent store; the lifecycle code only reads it.
#[derive(Clone)]
pub struct Owner {
    /// Unique owner identifier.
    pub owner_id: OwnerId,

    /// Login email (unique).
    pub email: String,

    /// Display name used to derive the slug.
    pub display_name: String,

    /// Room slug (unique).
    pub slug: String,

    /// Encrypted provider refresh token used to provision meetings.
    pub credential: String,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Redacts the email and the encrypted credential.
impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("owner_id", &self.owner_id)
            .field("email", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .field("slug", &self.slug)
            .field("credential", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// One provisioned, time-bounded meeting.
///
/// Append-only: a new row per provisioning episode, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    /// Unique meeting identifier.
    pub meeting_id: MeetingId,

    /// Owner the meeting was provisioned for.
    pub owner_id: OwnerId,

    /// URL participants are redirected to.
    pub join_url: String,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// The meeting is active while `now < expires_at`.
    pub expires_at: DateTime<Utc>,
}

impl Meeting {
    /// Whether the meeting is still active at `now`.
    ///
    /// Strict: a meeting expiring exactly at `now` is inactive.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// What the routing layer should do with a room request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomDecision {
    /// A meeting is active: send the requester to it.
    Redirect(String),

    /// No meeting yet: show the waiting room.
    EnterWaitingRoom,
}

/// Payload of the terminal `active` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePayload {
    /// Join URL of the meeting that just became active.
    pub meet_url: String,
}

/// Payload of the terminal `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable reason (`invalid-slug`, `not-found`, `internal`).
    pub message: String,
}

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Store connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Number of waiters currently connected.
    pub waiters: usize,
}

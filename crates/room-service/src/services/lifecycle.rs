//! Meeting lifecycle.
//!
//! Decides whether an owner has an active meeting and, for the owner only,
//! provisions a new one. Holds no state of its own beyond what it reads and
//! writes through the meeting store.
//!
//! There is no per-owner lock: two concurrent owner requests that both see
//! no active meeting will both provision. Visitors converge on whichever row
//! the store reports as most recent.

use crate::errors::RoomError;
use crate::models::{Meeting, Owner};
use crate::observability::metrics;
use crate::repositories::MeetingStore;
use crate::services::clock::Clock;
use crate::services::provisioner::MeetingProvisioner;
use chrono::Duration;
use common::types::OwnerId;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Owns the provision-or-reuse decision.
#[derive(Clone)]
pub struct LifecycleManager {
    meetings: Arc<dyn MeetingStore>,
    provisioner: Arc<dyn MeetingProvisioner>,
    clock: Arc<dyn Clock>,
    meeting_window: Duration,
}

impl LifecycleManager {
    pub fn new(
        meetings: Arc<dyn MeetingStore>,
        provisioner: Arc<dyn MeetingProvisioner>,
        clock: Arc<dyn Clock>,
        meeting_window: Duration,
    ) -> Self {
        Self {
            meetings,
            provisioner,
            clock,
            meeting_window,
        }
    }

    /// Most recent meeting for `owner_id` that has not yet expired.
    pub async fn get_active_meeting(&self, owner_id: OwnerId) -> Result<Option<Meeting>, RoomError> {
        self.meetings
            .find_active_meeting(owner_id, self.clock.now())
            .await
    }

    /// Provision a meeting for the owner and persist it.
    ///
    /// Only valid on the owner's own request path, after
    /// [`get_active_meeting`](Self::get_active_meeting) returned none.
    /// Broadcasting the new meeting is the caller's job.
    #[instrument(skip_all, fields(owner_id = %owner.owner_id, slug = %owner.slug))]
    pub async fn ensure_meeting(&self, owner: &Owner, is_owner: bool) -> Result<String, RoomError> {
        if !is_owner {
            warn!(target: "room.services.lifecycle", "ensure_meeting called for non-owner");
            return Err(RoomError::NotOwner);
        }

        let started = Instant::now();
        let outcome = self.provisioner.provision(owner).await;
        metrics::record_provisioning_duration(outcome.is_ok(), started.elapsed());

        let join_url = match outcome {
            Ok(url) => url,
            Err(e) => {
                metrics::record_provisioning_failure();
                warn!(target: "room.services.lifecycle", error = %e, "Provisioning failed");
                return Err(match e {
                    RoomError::ProvisioningFailed(reason) => RoomError::ProvisioningFailed(reason),
                    other => RoomError::ProvisioningFailed(other.to_string()),
                });
            }
        };

        // Expiry is measured from when the provider answered.
        let expires_at = self.clock.now() + self.meeting_window;
        let meeting = self
            .meetings
            .insert_meeting(owner.owner_id, &join_url, expires_at)
            .await?;

        metrics::record_meeting_provisioned();
        info!(
            target: "room.services.lifecycle",
            meeting_id = %meeting.meeting_id,
            expires_at = %meeting.expires_at,
            "Meeting provisioned"
        );

        Ok(meeting.join_url)
    }
}

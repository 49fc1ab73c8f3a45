//! Room entry point.
//!
//! Ties slug validation, owner lookup, the lifecycle manager and the
//! notification bus together for the two request paths: opening a room and
//! waiting on one.

use crate::errors::RoomError;
use crate::models::{Owner, RoomDecision};
use crate::repositories::OwnerStore;
use crate::services::lifecycle::LifecycleManager;
use crate::services::notification_bus::{NotificationBus, WaitEvent};
use common::slug::is_valid_slug;
use common::types::OwnerId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Result of asking to wait on a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitAdmission {
    /// A meeting is already active; send `active` and end the stream.
    AlreadyActive(String),

    /// Registered on the room's channel.
    Subscribed(u64),
}

#[derive(Clone)]
pub struct RoomService {
    owners: Arc<dyn OwnerStore>,
    lifecycle: LifecycleManager,
    bus: Arc<NotificationBus>,
}

impl RoomService {
    pub fn new(
        owners: Arc<dyn OwnerStore>,
        lifecycle: LifecycleManager,
        bus: Arc<NotificationBus>,
    ) -> Self {
        Self {
            owners,
            lifecycle,
            bus,
        }
    }

    /// Validate the slug shape, then look up its owner.
    pub async fn resolve_owner(&self, slug: &str) -> Result<Owner, RoomError> {
        if !is_valid_slug(slug) {
            return Err(RoomError::InvalidSlug(slug.to_string()));
        }

        self.owners
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| RoomError::NotFound(format!("No room named {}", slug)))
    }

    /// Decide what a request for `slug` gets.
    ///
    /// With an active meeting everyone is redirected. Without one the owner
    /// provisions, the room's waiters are told, and the owner is redirected;
    /// anyone else enters the waiting room.
    #[instrument(skip_all, fields(slug = %slug, is_owner = tracing::field::Empty))]
    pub async fn check_or_wait(
        &self,
        slug: &str,
        requester: Option<OwnerId>,
    ) -> Result<RoomDecision, RoomError> {
        let owner = self.resolve_owner(slug).await?;
        let is_owner = requester == Some(owner.owner_id);
        tracing::Span::current().record("is_owner", is_owner);

        if let Some(meeting) = self.lifecycle.get_active_meeting(owner.owner_id).await? {
            debug!(target: "room.services.room", "Meeting already active");
            return Ok(RoomDecision::Redirect(meeting.join_url));
        }

        if !is_owner {
            return Ok(RoomDecision::EnterWaitingRoom);
        }

        let join_url = self.lifecycle.ensure_meeting(&owner, true).await?;
        let report = self
            .bus
            .broadcast(&owner.slug, WaitEvent::active(join_url.clone()));
        info!(
            target: "room.services.room",
            notified = report.delivered,
            "Owner opened room"
        );

        Ok(RoomDecision::Redirect(join_url))
    }

    /// Register a waiting-room stream for `slug`.
    ///
    /// Checks for an active meeting first and subscribes with no suspension
    /// point in between, so an `active` broadcast cannot slip past unseen.
    #[instrument(skip_all, fields(slug = %slug))]
    pub async fn admit_waiter(
        &self,
        slug: &str,
        tx: mpsc::Sender<WaitEvent>,
        disconnect: CancellationToken,
    ) -> Result<WaitAdmission, RoomError> {
        let owner = self.resolve_owner(slug).await?;

        if let Some(meeting) = self.lifecycle.get_active_meeting(owner.owner_id).await? {
            return Ok(WaitAdmission::AlreadyActive(meeting.join_url));
        }

        let waiter_id = self.bus.subscribe(&owner.slug, tx, disconnect);
        Ok(WaitAdmission::Subscribed(waiter_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryStore, NewOwner};
    use crate::services::clock::mock::ManualClock;
    use crate::services::clock::Clock;
    use crate::services::notification_bus::WAITER_BUFFER;
    use crate::services::provisioner::mock::MockProvisioner;
    use chrono::{Duration, TimeZone, Utc};
    use std::time::Duration as StdDuration;

    struct Fixture {
        store: Arc<InMemoryStore>,
        provisioner: Arc<MockProvisioner>,
        clock: Arc<ManualClock>,
        bus: Arc<NotificationBus>,
        rooms: RoomService,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let provisioner = Arc::new(MockProvisioner::succeeding("https://meet/abc-defg-hij"));
        let bus = Arc::new(NotificationBus::new(StdDuration::from_secs(25)));
        let lifecycle = LifecycleManager::new(
            store.clone(),
            provisioner.clone(),
            clock.clone(),
            Duration::milliseconds(300_000),
        );
        let rooms = RoomService::new(store.clone(), lifecycle, bus.clone());
        Fixture {
            store,
            provisioner,
            clock,
            bus,
            rooms,
        }
    }

    async fn seed_alice(store: &InMemoryStore) -> Owner {
        store
            .insert_owner(NewOwner {
                email: "alice@example.com".to_string(),
                display_name: "Alice".to_string(),
                slug: "alice".to_string(),
                credential: "sealed".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_slug_rejected_before_store_lookup() {
        let f = fixture();

        let result = f.rooms.check_or_wait("Not Valid!", None).await;
        assert!(matches!(result, Err(RoomError::InvalidSlug(_))));
        assert_eq!(f.store.slug_lookups(), 0);
        assert_eq!(f.bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let f = fixture();
        let result = f.rooms.check_or_wait("nobody", None).await;
        assert!(matches!(result, Err(RoomError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_visitor_enters_waiting_room_without_provisioning() {
        let f = fixture();
        seed_alice(&f.store).await;

        let decision = f.rooms.check_or_wait("alice", None).await.unwrap();
        assert_eq!(decision, RoomDecision::EnterWaitingRoom);

        let stranger = Some(OwnerId::new());
        let decision = f.rooms.check_or_wait("alice", stranger).await.unwrap();
        assert_eq!(decision, RoomDecision::EnterWaitingRoom);
        assert_eq!(f.provisioner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_owner_provisions_and_waiter_is_notified() {
        let f = fixture();
        let alice = seed_alice(&f.store).await;
        let now = f.clock.now();

        let (tx, mut rx) = mpsc::channel(WAITER_BUFFER);
        let admission = f
            .rooms
            .admit_waiter("alice", tx, CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(admission, WaitAdmission::Subscribed(_)));

        let decision = f
            .rooms
            .check_or_wait("alice", Some(alice.owner_id))
            .await
            .unwrap();
        assert_eq!(
            decision,
            RoomDecision::Redirect("https://meet/abc-defg-hij".to_string())
        );

        let meetings = f.store.meetings_for(alice.owner_id);
        assert_eq!(meetings.len(), 1);
        assert_eq!(
            meetings.first().unwrap().expires_at,
            now + Duration::milliseconds(300_000)
        );

        assert_eq!(
            rx.recv().await,
            Some(WaitEvent::active("https://meet/abc-defg-hij"))
        );
        assert_eq!(rx.recv().await, None);
        assert_eq!(f.bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_active_meeting_redirects_everyone_without_reprovisioning() {
        let f = fixture();
        let alice = seed_alice(&f.store).await;

        f.rooms
            .check_or_wait("alice", Some(alice.owner_id))
            .await
            .unwrap();
        let visitor = f.rooms.check_or_wait("alice", None).await.unwrap();
        let owner_again = f
            .rooms
            .check_or_wait("alice", Some(alice.owner_id))
            .await
            .unwrap();

        let expected = RoomDecision::Redirect("https://meet/abc-defg-hij".to_string());
        assert_eq!(visitor, expected);
        assert_eq!(owner_again, expected);
        assert_eq!(f.provisioner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_admit_waiter_when_already_active() {
        let f = fixture();
        let alice = seed_alice(&f.store).await;
        f.rooms
            .check_or_wait("alice", Some(alice.owner_id))
            .await
            .unwrap();

        let (tx, _rx) = mpsc::channel(WAITER_BUFFER);
        let admission = f
            .rooms
            .admit_waiter("alice", tx, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            admission,
            WaitAdmission::AlreadyActive("https://meet/abc-defg-hij".to_string())
        );
        assert_eq!(f.bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_provisioning_failure_leaves_waiters_waiting() {
        let f = fixture();
        let alice = seed_alice(&f.store).await;
        f.provisioner.set_outcome(Err("quota".to_string()));

        let (tx, _rx) = mpsc::channel(WAITER_BUFFER);
        f.rooms
            .admit_waiter("alice", tx, CancellationToken::new())
            .await
            .unwrap();

        let result = f.rooms.check_or_wait("alice", Some(alice.owner_id)).await;
        assert!(matches!(result, Err(RoomError::ProvisioningFailed(_))));
        assert_eq!(f.bus.waiter_count("alice"), 1);
        assert!(f.store.meetings_for(alice.owner_id).is_empty());
    }

    #[tokio::test]
    async fn test_expired_meeting_sends_visitor_back_to_waiting() {
        let f = fixture();
        let alice = seed_alice(&f.store).await;
        f.rooms
            .check_or_wait("alice", Some(alice.owner_id))
            .await
            .unwrap();

        f.clock.advance(Duration::milliseconds(300_000));
        let decision = f.rooms.check_or_wait("alice", None).await.unwrap();
        assert_eq!(decision, RoomDecision::EnterWaitingRoom);
    }
}

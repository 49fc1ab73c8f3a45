//! In-memory store.
//!
//! Implements every store trait over plain vectors guarded by a mutex.
//! Used by the test harness and by unit tests that exercise lifecycle
//! logic without PostgreSQL.

use crate::errors::RoomError;
use crate::models::{Meeting, Owner};
use crate::repositories::{MeetingStore, NewOwner, OwnerStore, WaitingSessionStore};
use crate::services::clock::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{MeetingId, OwnerId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A recorded waiting session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingSessionRecord {
    pub slug: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    owners: Vec<Owner>,
    // Insertion order doubles as creation order.
    meetings: Vec<Meeting>,
    waiting_sessions: Vec<WaitingSessionRecord>,
}

/// Store backed by process memory.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
    slug_lookups: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Timestamps rows with `clock` instead of the system clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
            unavailable: AtomicBool::new(false),
            slug_lookups: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent operation fail with a database error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `find_by_slug` calls served so far.
    pub fn slug_lookups(&self) -> usize {
        self.slug_lookups.load(Ordering::SeqCst)
    }

    /// All meetings for an owner, oldest first.
    pub fn meetings_for(&self, owner_id: OwnerId) -> Vec<Meeting> {
        self.tables()
            .meetings
            .iter()
            .filter(|m| m.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// All recorded waiting sessions, oldest first.
    pub fn waiting_sessions(&self) -> Vec<WaitingSessionRecord> {
        self.tables().waiting_sessions.clone()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), RoomError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RoomError::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OwnerStore for InMemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Owner>, RoomError> {
        self.slug_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.tables().owners.iter().find(|o| o.slug == slug).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Owner>, RoomError> {
        self.check_available()?;
        Ok(self
            .tables()
            .owners
            .iter()
            .find(|o| o.email == email)
            .cloned())
    }

    async fn slugs_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RoomError> {
        self.check_available()?;
        Ok(self
            .tables()
            .owners
            .iter()
            .filter(|o| o.slug.starts_with(prefix))
            .map(|o| o.slug.clone())
            .collect())
    }

    async fn insert_owner(&self, owner: NewOwner) -> Result<Owner, RoomError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut tables = self.tables();

        if tables.owners.iter().any(|o| o.slug == owner.slug) {
            return Err(RoomError::Database(format!(
                "slug already taken: {}",
                owner.slug
            )));
        }
        if tables.owners.iter().any(|o| o.email == owner.email) {
            return Err(RoomError::Database("email already registered".to_string()));
        }

        let created = Owner {
            owner_id: OwnerId::new(),
            email: owner.email,
            display_name: owner.display_name,
            slug: owner.slug,
            credential: owner.credential,
            created_at: now,
            updated_at: now,
        };
        tables.owners.push(created.clone());
        Ok(created)
    }

    async fn update_credential(
        &self,
        owner_id: OwnerId,
        credential: &str,
    ) -> Result<(), RoomError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut tables = self.tables();

        let owner = tables
            .owners
            .iter_mut()
            .find(|o| o.owner_id == owner_id)
            .ok_or_else(|| RoomError::NotFound("Owner not found".to_string()))?;
        owner.credential = credential.to_string();
        owner.updated_at = now;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RoomError> {
        self.check_available()
    }
}

#[async_trait]
impl MeetingStore for InMemoryStore {
    async fn find_active_meeting(
        &self,
        owner_id: OwnerId,
        now: DateTime<Utc>,
    ) -> Result<Option<Meeting>, RoomError> {
        self.check_available()?;
        Ok(self
            .tables()
            .meetings
            .iter()
            .rev()
            .find(|m| m.owner_id == owner_id && m.is_active_at(now))
            .cloned())
    }

    async fn insert_meeting(
        &self,
        owner_id: OwnerId,
        join_url: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Meeting, RoomError> {
        self.check_available()?;
        let meeting = Meeting {
            meeting_id: MeetingId::new(),
            owner_id,
            join_url: join_url.to_string(),
            created_at: self.clock.now(),
            expires_at,
        };
        self.tables().meetings.push(meeting.clone());
        Ok(meeting)
    }
}

#[async_trait]
impl WaitingSessionStore for InMemoryStore {
    async fn record_waiting_session(
        &self,
        slug: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(), RoomError> {
        self.check_available()?;
        let record = WaitingSessionRecord {
            slug: slug.to_string(),
            ip,
            user_agent,
            created_at: self.clock.now(),
        };
        self.tables().waiting_sessions.push(record);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_owner(slug: &str) -> NewOwner {
        NewOwner {
            email: format!("{}@example.com", slug),
            display_name: slug.to_string(),
            slug: slug.to_string(),
            credential: "sealed".to_string(),
        }
    }

    #[tokio::test]
    async fn test_find_by_slug_after_insert() {
        let store = InMemoryStore::new();
        let owner = store.insert_owner(new_owner("alice")).await.unwrap();

        let found = store.find_by_slug("alice").await.unwrap().unwrap();
        assert_eq!(found.owner_id, owner.owner_id);
        assert!(store.find_by_slug("bob").await.unwrap().is_none());
        assert_eq!(store.slug_lookups(), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_slug() {
        let store = InMemoryStore::new();
        store.insert_owner(new_owner("alice")).await.unwrap();

        let mut dup = new_owner("alice");
        dup.email = "other@example.com".to_string();
        let result = store.insert_owner(dup).await;
        assert!(matches!(result, Err(RoomError::Database(_))));
    }

    #[tokio::test]
    async fn test_slugs_with_prefix() {
        let store = InMemoryStore::new();
        for slug in ["john", "john2", "johnny", "alice"] {
            store.insert_owner(new_owner(slug)).await.unwrap();
        }

        let mut slugs = store.slugs_with_prefix("john").await.unwrap();
        slugs.sort();
        assert_eq!(slugs, vec!["john", "john2", "johnny"]);
    }

    #[tokio::test]
    async fn test_find_active_meeting_prefers_newest() {
        let store = InMemoryStore::new();
        let owner_id = OwnerId::new();
        let now = Utc::now();

        store
            .insert_meeting(owner_id, "https://meet/old", now + Duration::minutes(5))
            .await
            .unwrap();
        store
            .insert_meeting(owner_id, "https://meet/new", now + Duration::minutes(3))
            .await
            .unwrap();

        let active = store.find_active_meeting(owner_id, now).await.unwrap().unwrap();
        assert_eq!(active.join_url, "https://meet/new");
    }

    #[tokio::test]
    async fn test_find_active_meeting_ignores_expired_and_other_owners() {
        let store = InMemoryStore::new();
        let owner_id = OwnerId::new();
        let now = Utc::now();

        store
            .insert_meeting(owner_id, "https://meet/expired", now)
            .await
            .unwrap();
        store
            .insert_meeting(OwnerId::new(), "https://meet/other", now + Duration::minutes(5))
            .await
            .unwrap();

        assert!(store.find_active_meeting(owner_id, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(store.ping().await, Err(RoomError::Database(_))));
        assert!(matches!(
            store.find_by_slug("alice").await,
            Err(RoomError::Database(_))
        ));

        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_update_credential_unknown_owner() {
        let store = InMemoryStore::new();
        let result = store.update_credential(OwnerId::new(), "x").await;
        assert!(matches!(result, Err(RoomError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_record_waiting_session() {
        let store = InMemoryStore::new();
        store
            .record_waiting_session("alice", Some("10.0.0.1".to_string()), None)
            .await
            .unwrap();

        let sessions = store.waiting_sessions();
        assert_eq!(sessions.len(), 1);
        let session = sessions.first().unwrap();
        assert_eq!(session.slug, "alice");
        assert_eq!(session.ip.as_deref(), Some("10.0.0.1"));
    }
}

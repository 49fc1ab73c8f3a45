//! Repository layer for the room service.
//!
//! Each store is an async trait so the lifecycle code can run against
//! PostgreSQL in production and against [`memory::InMemoryStore`] in tests.
//! PostgreSQL queries are parameterized runtime queries mapped through
//! `sqlx::FromRow` rows.

pub mod meetings;
pub mod memory;
pub mod owners;
pub mod waiting_sessions;

pub use meetings::{MeetingStore, PgMeetingsRepository};
pub use memory::InMemoryStore;
pub use owners::{NewOwner, OwnerStore, PgOwnersRepository};
pub use waiting_sessions::{PgWaitingSessionsRepository, WaitingSessionStore};

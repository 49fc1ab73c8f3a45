//! Middleware for the room service.

pub mod session;

pub use session::{resolve_session, SessionIdentity, SessionSigner, SESSION_COOKIE};

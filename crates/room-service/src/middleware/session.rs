//! Owner session cookies.
//!
//! The login flow issues a `room_session` cookie of the form
//! `<owner_uuid>.<base64url(HMAC-SHA256(owner_uuid))>`. This middleware
//! verifies it on room routes and injects a [`SessionIdentity`]. A missing,
//! malformed or tampered cookie yields an anonymous identity, never an error.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::secret::{ExposeSecret, SecretString};
use common::types::OwnerId;
use ring::hmac;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Cookie name carrying the owner session.
pub const SESSION_COOKIE: &str = "room_session";

/// Identity attached to each room request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    /// The signed-in owner, if any.
    pub owner_id: Option<OwnerId>,
}

/// Signs and verifies session cookie values.
#[derive(Clone)]
pub struct SessionSigner {
    key: hmac::Key,
}

impl fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSigner")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SessionSigner {
    pub fn new(secret: &SecretString) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.expose_secret().as_bytes()),
        }
    }

    /// Cookie value for `owner_id`.
    pub fn sign(&self, owner_id: OwnerId) -> String {
        let id = owner_id.to_string();
        let tag = hmac::sign(&self.key, id.as_bytes());
        format!("{}.{}", id, URL_SAFE_NO_PAD.encode(tag.as_ref()))
    }

    /// Full `Set-Cookie` value for `owner_id`.
    pub fn cookie_header(&self, owner_id: OwnerId) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; Secure; SameSite=Lax",
            SESSION_COOKIE,
            self.sign(owner_id)
        )
    }

    /// Owner named by a cookie value, if its signature checks out.
    pub fn verify(&self, value: &str) -> Option<OwnerId> {
        let (id, tag) = value.split_once('.')?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;
        hmac::verify(&self.key, id.as_bytes(), &tag).ok()?;
        id.parse().ok()
    }

    /// Identity carried by a raw `Cookie` header.
    pub fn identity_from_cookie_header(&self, cookie_header: &str) -> SessionIdentity {
        let owner_id = cookie_header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| self.verify(value));

        SessionIdentity { owner_id }
    }
}

/// Resolve the owner session and attach it as a request extension.
pub async fn resolve_session(
    State(signer): State<Arc<SessionSigner>>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = req
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|value| signer.identity_from_cookie_header(value))
        .find(|identity| identity.owner_id.is_some())
        .unwrap_or_default();

    if identity.owner_id.is_some() {
        debug!(target: "room.middleware.session", "Owner session resolved");
    }

    req.extensions_mut().insert(identity);
    next.run(req).await
}

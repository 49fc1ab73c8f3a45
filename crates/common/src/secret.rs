//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for owner refresh tokens, OAuth
//! client secrets, the session signing secret and the credential encryption
//! key. `SecretString` and `SecretBox<T>` redact themselves in `Debug`, so a
//! struct that derives `Debug` over them is safe to log with `{:?}` or
//! through `tracing`. Values are zeroized on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct OwnerGrant {
//!     email: String,
//!     refresh_token: SecretString,
//! }
//!
//! let grant = OwnerGrant {
//!     email: "alice@example.com".to_string(),
//!     refresh_token: SecretString::from("1//refresh"),
//! };
//!
//! assert!(!format!("{grant:?}").contains("1//refresh"));
//! assert_eq!(grant.refresh_token.expose_secret(), "1//refresh");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

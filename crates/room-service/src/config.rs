//! Room service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::secret::{ExposeSecret, SecretBox, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default meeting window in milliseconds (5 minutes).
pub const DEFAULT_MEET_WINDOW_MS: u64 = 5 * 60 * 1000;

/// Upper bound for the meeting window (24 hours).
pub const MAX_MEET_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Default interval between keep-alive pings on waiting-room streams.
pub const DEFAULT_WAITER_KEEPALIVE_SECONDS: u64 = 25;

/// Upper bound for the keep-alive interval (1 hour).
pub const MAX_WAITER_KEEPALIVE_SECONDS: u64 = 60 * 60;

/// Minimum accepted session secret length in characters.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Required credential key length in bytes (AES-256).
pub const CREDENTIAL_KEY_LEN: usize = 32;

/// Default OAuth token endpoint used to refresh owner credentials.
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default Calendar API base URL used to create conferences.
pub const DEFAULT_GOOGLE_CALENDAR_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Room service configuration.
///
/// Database URL, secrets and keys are redacted in Debug output.
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// How long a provisioned meeting stays active, in milliseconds.
    pub meet_window_ms: u64,

    /// Interval between keep-alive pings on waiting-room streams.
    pub waiter_keepalive_seconds: u64,

    /// Secret used to sign owner session cookies.
    pub session_secret: SecretString,

    /// 32-byte AES-256-GCM key for owner credentials at rest.
    pub credential_key: SecretBox<Vec<u8>>,

    /// OAuth client ID for the meeting provider.
    pub google_client_id: String,

    /// OAuth client secret for the meeting provider.
    pub google_client_secret: SecretString,

    /// OAuth token endpoint.
    pub google_token_url: String,

    /// Calendar API base URL.
    pub google_calendar_url: String,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            database_url: self.database_url.clone(),
            bind_address: self.bind_address.clone(),
            meet_window_ms: self.meet_window_ms,
            waiter_keepalive_seconds: self.waiter_keepalive_seconds,
            session_secret: self.session_secret.clone(),
            credential_key: SecretBox::new(Box::new(self.credential_key.expose_secret().clone())),
            google_client_id: self.google_client_id.clone(),
            google_client_secret: self.google_client_secret.clone(),
            google_token_url: self.google_token_url.clone(),
            google_calendar_url: self.google_calendar_url.clone(),
        }
    }
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("meet_window_ms", &self.meet_window_ms)
            .field("waiter_keepalive_seconds", &self.waiter_keepalive_seconds)
            .field("session_secret", &"[REDACTED]")
            .field("credential_key", &"[REDACTED]")
            .field("google_client_id", &self.google_client_id)
            .field("google_client_secret", &"[REDACTED]")
            .field("google_token_url", &self.google_token_url)
            .field("google_calendar_url", &self.google_calendar_url)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid meeting window configuration: {0}")]
    InvalidMeetWindow(String),

    #[error("Invalid keep-alive configuration: {0}")]
    InvalidKeepAlive(String),

    #[error("Invalid session secret: {0}")]
    InvalidSessionSecret(String),

    #[error("Invalid credential key: {0}")]
    InvalidCredentialKey(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let meet_window_ms = if let Some(value_str) = vars.get("MEET_WINDOW_MS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidMeetWindow(format!(
                    "MEET_WINDOW_MS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidMeetWindow(
                    "MEET_WINDOW_MS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_MEET_WINDOW_MS {
                return Err(ConfigError::InvalidMeetWindow(format!(
                    "MEET_WINDOW_MS must not exceed {}, got {}",
                    MAX_MEET_WINDOW_MS, value
                )));
            }

            value
        } else {
            DEFAULT_MEET_WINDOW_MS
        };

        let waiter_keepalive_seconds =
            if let Some(value_str) = vars.get("WAITER_KEEPALIVE_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidKeepAlive(format!(
                        "WAITER_KEEPALIVE_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidKeepAlive(
                        "WAITER_KEEPALIVE_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_WAITER_KEEPALIVE_SECONDS {
                    return Err(ConfigError::InvalidKeepAlive(format!(
                        "WAITER_KEEPALIVE_SECONDS must not exceed {}, got {}",
                        MAX_WAITER_KEEPALIVE_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_WAITER_KEEPALIVE_SECONDS
            };

        let session_secret = required(vars, "SESSION_SECRET")?;
        if session_secret.chars().count() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::InvalidSessionSecret(format!(
                "SESSION_SECRET must be at least {} characters long",
                MIN_SESSION_SECRET_LEN
            )));
        }

        let credential_key_b64 = required(vars, "CREDENTIAL_KEY")?;
        let credential_key = STANDARD.decode(credential_key_b64.trim()).map_err(|e| {
            ConfigError::InvalidCredentialKey(format!("CREDENTIAL_KEY must be base64: {}", e))
        })?;
        if credential_key.len() != CREDENTIAL_KEY_LEN {
            return Err(ConfigError::InvalidCredentialKey(format!(
                "CREDENTIAL_KEY must decode to {} bytes, got {}",
                CREDENTIAL_KEY_LEN,
                credential_key.len()
            )));
        }

        let google_client_id = required(vars, "GOOGLE_CLIENT_ID")?;
        let google_client_secret = required(vars, "GOOGLE_CLIENT_SECRET")?;

        let google_token_url = vars
            .get("GOOGLE_TOKEN_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GOOGLE_TOKEN_URL.to_string());

        let google_calendar_url = vars
            .get("GOOGLE_CALENDAR_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GOOGLE_CALENDAR_URL.to_string());

        Ok(Config {
            database_url,
            bind_address,
            meet_window_ms,
            waiter_keepalive_seconds,
            session_secret: SecretString::from(session_secret),
            credential_key: SecretBox::new(Box::new(credential_key)),
            google_client_id,
            google_client_secret: SecretString::from(google_client_secret),
            google_token_url,
            google_calendar_url,
        })
    }
}

/// Fetch a required, non-empty variable.
fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://localhost/rooms_test".to_string(),
            ),
            (
                "SESSION_SECRET".to_string(),
                "0123456789abcdef0123456789abcdef".to_string(),
            ),
            (
                "CREDENTIAL_KEY".to_string(),
                STANDARD.encode([42u8; CREDENTIAL_KEY_LEN]),
            ),
            ("GOOGLE_CLIENT_ID".to_string(), "client-id".to_string()),
            (
                "GOOGLE_CLIENT_SECRET".to_string(),
                "client-secret-value".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.database_url, "postgresql://localhost/rooms_test");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.meet_window_ms, 300_000);
        assert_eq!(config.waiter_keepalive_seconds, 25);
        assert_eq!(config.google_token_url, DEFAULT_GOOGLE_TOKEN_URL);
        assert_eq!(config.google_calendar_url, DEFAULT_GOOGLE_CALENDAR_URL);
        assert_eq!(config.credential_key.expose_secret().len(), 32);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("MEET_WINDOW_MS".to_string(), "600000".to_string());
        vars.insert("WAITER_KEEPALIVE_SECONDS".to_string(), "10".to_string());
        vars.insert(
            "GOOGLE_TOKEN_URL".to_string(),
            "http://127.0.0.1:9999/token".to_string(),
        );
        vars.insert(
            "GOOGLE_CALENDAR_URL".to_string(),
            "http://127.0.0.1:9999/calendar/v3".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.meet_window_ms, 600_000);
        assert_eq!(config.waiter_keepalive_seconds, 10);
        assert_eq!(config.google_token_url, "http://127.0.0.1:9999/token");
        assert_eq!(
            config.google_calendar_url,
            "http://127.0.0.1:9999/calendar/v3"
        );
    }

    #[test]
    fn test_from_vars_missing_database_url() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_from_vars_blank_value_counts_as_missing() {
        let mut vars = base_vars();
        vars.insert("GOOGLE_CLIENT_ID".to_string(), "   ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "GOOGLE_CLIENT_ID"));
    }

    #[test]
    fn test_meet_window_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("MEET_WINDOW_MS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidMeetWindow(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_meet_window_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("MEET_WINDOW_MS".to_string(), "86400001".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidMeetWindow(msg)) if msg.contains("must not exceed"))
        );
    }

    #[test]
    fn test_meet_window_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("MEET_WINDOW_MS".to_string(), "five-minutes".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidMeetWindow(msg)) if msg.contains("must be a valid positive integer"))
        );
    }

    #[test]
    fn test_keepalive_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("WAITER_KEEPALIVE_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidKeepAlive(_))));
    }

    #[test]
    fn test_keepalive_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert(
            "WAITER_KEEPALIVE_SECONDS".to_string(),
            u64::MAX.to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidKeepAlive(msg)) if msg.contains("must not exceed"))
        );
    }

    #[test]
    fn test_keepalive_accepts_upper_bound() {
        let mut vars = base_vars();
        vars.insert(
            "WAITER_KEEPALIVE_SECONDS".to_string(),
            MAX_WAITER_KEEPALIVE_SECONDS.to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.waiter_keepalive_seconds, 3600);
    }

    #[test]
    fn test_session_secret_rejects_short_value() {
        let mut vars = base_vars();
        vars.insert("SESSION_SECRET".to_string(), "too-short".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidSessionSecret(msg)) if msg.contains("at least 32"))
        );
    }

    #[test]
    fn test_credential_key_rejects_bad_base64() {
        let mut vars = base_vars();
        vars.insert("CREDENTIAL_KEY".to_string(), "%%%".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCredentialKey(msg)) if msg.contains("base64"))
        );
    }

    #[test]
    fn test_credential_key_rejects_wrong_length() {
        let mut vars = base_vars();
        vars.insert("CREDENTIAL_KEY".to_string(), STANDARD.encode([1u8; 16]));

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCredentialKey(msg)) if msg.contains("32 bytes"))
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("postgresql://"));
        assert!(!debug_output.contains("0123456789abcdef"));
        assert!(!debug_output.contains("client-secret-value"));
        assert!(debug_output.contains("client-id"));
    }

    #[test]
    fn test_clone_keeps_key_material() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");
        let cloned = config.clone();

        assert_eq!(
            cloned.credential_key.expose_secret(),
            config.credential_key.expose_secret()
        );
        assert_eq!(
            cloned.session_secret.expose_secret(),
            config.session_secret.expose_secret()
        );
    }
}

//! Room service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages for server-side failures are generic; details are logged.
//!
//! Delivery failures inside the notification bus are not represented here:
//! they are absorbed by the bus and never reach a caller.

use crate::observability::metrics;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// `Retry-After` hint, in seconds, on retryable failures.
pub const RETRY_AFTER_SECONDS: u64 = 5;

/// Room service error type.
///
/// Maps to HTTP status codes:
/// - InvalidSlug: 400 Bad Request
/// - NotOwner: 403 Forbidden
/// - NotFound: 404 Not Found
/// - ProvisioningFailed: 502 Bad Gateway (retryable by reloading)
/// - Database, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not the room owner")]
    NotOwner,

    #[error("Provisioning failed: {0}")]
    ProvisioningFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl RoomError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RoomError::InvalidSlug(_) => 400,
            RoomError::NotOwner => 403,
            RoomError::NotFound(_) => 404,
            RoomError::ProvisioningFailed(_) => 502,
            RoomError::Database(_) | RoomError::Internal => 500,
        }
    }

    /// Bounded label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            RoomError::InvalidSlug(_) => "invalid_slug",
            RoomError::NotOwner => "not_owner",
            RoomError::NotFound(_) => "not_found",
            RoomError::ProvisioningFailed(_) => "provisioning_failed",
            RoomError::Database(_) => "database",
            RoomError::Internal => "internal",
        }
    }

    /// Whether the requester may succeed by simply trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoomError::ProvisioningFailed(_))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        metrics::record_error(self.error_type(), self.status_code());

        let (status, code, message) = match &self {
            RoomError::InvalidSlug(slug) => (
                StatusCode::BAD_REQUEST,
                "INVALID_SLUG",
                format!("'{}' is not a valid room link", slug),
            ),
            RoomError::NotFound(resource) => (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone()),
            RoomError::NotOwner => (
                StatusCode::FORBIDDEN,
                "NOT_OWNER",
                "Only the room owner can start a meeting".to_string(),
            ),
            RoomError::ProvisioningFailed(reason) => {
                tracing::warn!(target: "room.provisioning", reason = %reason, "Meeting provisioning failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "PROVISIONING_FAILED",
                    "Failed to create the meeting. Reload to try again.".to_string(),
                )
            }
            RoomError::Database(err) => {
                tracing::error!(target: "room.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            RoomError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECONDS));
        }
        response
    }
}

/// Convert sqlx errors to RoomError
impl From<sqlx::Error> for RoomError {
    fn from(err: sqlx::Error) -> Self {
        RoomError::Database(err.to_string())
    }
}

//! Meeting provisioning.
//!
//! [`MeetingProvisioner`] creates one external video conference for an
//! owner and returns its join URL. The production implementation talks to
//! Google Calendar: it exchanges the owner's refresh token for an access
//! token, then inserts a short calendar event with a Meet conference
//! attached.

use crate::errors::RoomError;
use crate::models::Owner;
use crate::services::credentials::CredentialCipher;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Timeout for each call to the provider.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection timeout for the provider HTTP client.
const PROVIDER_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates external meetings.
#[async_trait]
pub trait MeetingProvisioner: Send + Sync {
    /// Create a meeting on the owner's behalf and return its join URL.
    async fn provision(&self, owner: &Owner) -> Result<String, RoomError>;
}

/// Settings for [`GoogleMeetProvisioner`].
#[derive(Clone)]
pub struct GoogleMeetSettings {
    pub client_id: String,
    pub client_secret: SecretString,
    pub token_url: String,
    pub calendar_url: String,
    /// Length of the calendar event wrapping the conference.
    pub event_length: ChronoDuration,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    hangout_link: Option<String>,
    conference_data: Option<ConferenceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    #[serde(default)]
    entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryPoint {
    entry_point_type: String,
    uri: Option<String>,
}

impl EventResponse {
    /// The video entry point, falling back to the legacy hangout link.
    fn join_url(self) -> Option<String> {
        self.conference_data
            .and_then(|data| {
                data.entry_points
                    .into_iter()
                    .find(|ep| ep.entry_point_type == "video")
                    .and_then(|ep| ep.uri)
            })
            .or(self.hangout_link)
    }
}

/// Google Meet provisioner backed by the Calendar API.
pub struct GoogleMeetProvisioner {
    settings: GoogleMeetSettings,
    cipher: CredentialCipher,
    http_client: reqwest::Client,
}

impl GoogleMeetProvisioner {
    pub fn new(settings: GoogleMeetSettings, cipher: CredentialCipher) -> Result<Self, RoomError> {
        let http_client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .connect_timeout(PROVIDER_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                warn!(target: "room.services.provisioner", error = %e, "Failed to build HTTP client");
                RoomError::Internal
            })?;

        Ok(Self {
            settings,
            cipher,
            http_client,
        })
    }

    #[instrument(skip_all)]
    async fn exchange_refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<SecretString, RoomError> {
        let form_body = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
        ];

        let response = self
            .http_client
            .post(&self.settings.token_url)
            .form(&form_body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "room.services.provisioner", error = %e, "Token request failed");
                RoomError::ProvisioningFailed(format!("token request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "room.services.provisioner",
                status = %status,
                "Token exchange rejected"
            );
            return Err(RoomError::ProvisioningFailed(format!(
                "token exchange returned {}",
                status
            )));
        }

        let token: AccessTokenResponse = response.json().await.map_err(|e| {
            RoomError::ProvisioningFailed(format!("invalid token response: {}", e))
        })?;

        Ok(SecretString::from(token.access_token))
    }

    #[instrument(skip_all)]
    async fn create_conference(&self, access_token: &SecretString) -> Result<String, RoomError> {
        let url = format!(
            "{}/calendars/primary/events",
            self.settings.calendar_url.trim_end_matches('/')
        );
        let start = Utc::now();
        let end = start + self.settings.event_length;

        let body = serde_json::json!({
            "summary": "Instant meeting",
            "start": { "dateTime": start.to_rfc3339() },
            "end": { "dateTime": end.to_rfc3339() },
            "conferenceData": {
                "createRequest": {
                    "requestId": Uuid::new_v4().to_string(),
                    "conferenceSolutionKey": { "type": "hangoutsMeet" }
                }
            }
        });

        let response = self
            .http_client
            .post(&url)
            .query(&[("conferenceDataVersion", "1")])
            .bearer_auth(access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "room.services.provisioner", error = %e, "Event insert failed");
                RoomError::ProvisioningFailed(format!("event insert failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "room.services.provisioner",
                status = %status,
                "Calendar rejected event insert"
            );
            return Err(RoomError::ProvisioningFailed(format!(
                "event insert returned {}",
                status
            )));
        }

        let event: EventResponse = response.json().await.map_err(|e| {
            RoomError::ProvisioningFailed(format!("invalid event response: {}", e))
        })?;

        event
            .join_url()
            .ok_or_else(|| RoomError::ProvisioningFailed("event has no join URL".to_string()))
    }
}

#[async_trait]
impl MeetingProvisioner for GoogleMeetProvisioner {
    #[instrument(skip_all, fields(owner_id = %owner.owner_id))]
    async fn provision(&self, owner: &Owner) -> Result<String, RoomError> {
        let refresh_token = self.cipher.open(&owner.credential).map_err(|e| {
            warn!(target: "room.services.provisioner", error = %e, "Owner credential unusable");
            RoomError::ProvisioningFailed("owner credential unusable".to_string())
        })?;

        let access_token = self.exchange_refresh_token(&refresh_token).await?;
        self.create_conference(&access_token).await
    }
}

pub mod mock {
    //! Scripted provisioner for tests.

    use super::MeetingProvisioner;
    use crate::errors::RoomError;
    use crate::models::Owner;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// Returns a configured outcome and counts calls.
    pub struct MockProvisioner {
        outcome: Mutex<Result<String, String>>,
        delay: Mutex<Option<Duration>>,
        calls: AtomicUsize,
    }

    impl MockProvisioner {
        /// Every call returns `join_url`.
        pub fn succeeding(join_url: impl Into<String>) -> Self {
            Self::with_outcome(Ok(join_url.into()))
        }

        /// Every call fails with `reason`.
        pub fn failing(reason: impl Into<String>) -> Self {
            Self::with_outcome(Err(reason.into()))
        }

        fn with_outcome(outcome: Result<String, String>) -> Self {
            Self {
                outcome: Mutex::new(outcome),
                delay: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        /// Replace the outcome of subsequent calls.
        pub fn set_outcome(&self, outcome: Result<String, String>) {
            *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
        }

        /// Sleep this long before answering.
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MeetingProvisioner for MockProvisioner {
        async fn provision(&self, _owner: &Owner) -> Result<String, RoomError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.outcome
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .map_err(RoomError::ProvisioningFailed)
        }
    }
}

//! Owner accounts.
//!
//! Called once the provider login completes: creates the owner (allocating
//! a slug) or rotates the stored credential of an existing one.

use crate::errors::RoomError;
use crate::models::Owner;
use crate::repositories::{NewOwner, OwnerStore};
use crate::services::credentials::CredentialCipher;
use common::secret::{ExposeSecret, SecretString};
use common::slug;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Slugs that collide with fixed top-level routes.
pub const RESERVED_SLUGS: &[&str] = &["api", "health", "metrics"];

#[derive(Clone)]
pub struct AccountService {
    owners: Arc<dyn OwnerStore>,
    cipher: CredentialCipher,
}

impl AccountService {
    pub fn new(owners: Arc<dyn OwnerStore>, cipher: CredentialCipher) -> Self {
        Self { owners, cipher }
    }

    /// Create or update the owner identified by `email`.
    #[instrument(skip_all)]
    pub async fn upsert_owner(
        &self,
        display_name: &str,
        email: &str,
        refresh_token: &SecretString,
    ) -> Result<Owner, RoomError> {
        let email = email.trim().to_lowercase();
        let credential = self.cipher.seal(refresh_token.expose_secret()).map_err(|e| {
            error!(target: "room.services.accounts", error = %e, "Failed to seal credential");
            RoomError::Internal
        })?;

        if let Some(mut existing) = self.owners.find_by_email(&email).await? {
            self.owners
                .update_credential(existing.owner_id, &credential)
                .await?;
            existing.credential = credential;
            info!(
                target: "room.services.accounts",
                owner_id = %existing.owner_id,
                "Owner credential rotated"
            );
            return Ok(existing);
        }

        let base = slug::normalize(display_name, &email);
        let taken: HashSet<String> = self
            .owners
            .slugs_with_prefix(&base)
            .await?
            .into_iter()
            .collect();
        let final_slug = slug::allocate(&base, |candidate| {
            taken.contains(candidate) || RESERVED_SLUGS.iter().any(|r| *r == candidate)
        });

        let owner = self
            .owners
            .insert_owner(NewOwner {
                email,
                display_name: display_name.trim().to_string(),
                slug: final_slug,
                credential,
            })
            .await?;

        info!(
            target: "room.services.accounts",
            owner_id = %owner.owner_id,
            slug = %owner.slug,
            "Owner created"
        );
        Ok(owner)
    }
}

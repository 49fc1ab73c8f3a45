//! Owner credential encryption at rest.
//!
//! Refresh tokens are sealed with AES-256-GCM and stored as
//! `base64(nonce || ciphertext || tag)`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::secret::SecretString;
use ring::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    rand::{SecureRandom, SystemRandom},
};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

const TAG_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Invalid credential key length: {0} (expected 32)")]
    InvalidKeyLength(usize),

    #[error("Credential encryption failed: {0}")]
    Seal(String),

    #[error("Credential decryption failed: {0}")]
    Open(String),
}

/// Seals and opens owner credentials.
#[derive(Clone)]
pub struct CredentialCipher {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CredentialCipher {
    pub fn new(key: &[u8]) -> Result<Self, CredentialError> {
        if key.len() != 32 {
            return Err(CredentialError::InvalidKeyLength(key.len()));
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|e| CredentialError::Seal(format!("Cipher key creation failed: {}", e)))?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt a plaintext credential with a fresh random nonce.
    #[instrument(skip_all)]
    pub fn seal(&self, plaintext: &str) -> Result<String, CredentialError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|e| CredentialError::Seal(format!("Nonce generation failed: {}", e)))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|e| CredentialError::Seal(format!("Encryption operation failed: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a credential produced by [`CredentialCipher::seal`].
    #[instrument(skip_all)]
    pub fn open(&self, sealed: &str) -> Result<SecretString, CredentialError> {
        let raw = STANDARD
            .decode(sealed.trim())
            .map_err(|e| CredentialError::Open(format!("Invalid encoding: {}", e)))?;

        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(CredentialError::Open(format!(
                "Sealed credential too short: {} bytes",
                raw.len()
            )));
        }

        let (nonce_part, body) = raw.split_at(NONCE_LEN);
        let nonce_bytes: [u8; NONCE_LEN] = nonce_part
            .try_into()
            .map_err(|e| CredentialError::Open(format!("Invalid nonce format: {}", e)))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = body.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|e| CredentialError::Open(format!("Decryption operation failed: {}", e)))?;

        let plaintext = String::from_utf8(plaintext.to_vec())
            .map_err(|e| CredentialError::Open(format!("Credential is not UTF-8: {}", e)))?;
        Ok(SecretString::from(plaintext))
    }
}

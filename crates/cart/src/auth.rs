//! Bearer credential held in durable storage.
//!
//! Only the presence of a token is inspected locally; an expired or revoked
//! token is discovered when the backend rejects a request.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::storage::{Storage, StorageResult};

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "token";

/// Reads and writes the auth credential.
#[derive(Clone)]
pub struct AuthSession {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl AuthSession {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Current bearer token, if one is stored.
    ///
    /// Blank values and storage read failures are treated as "no credential".
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        match self.storage.get(TOKEN_KEY) {
            Ok(Some(raw)) if !raw.trim().is_empty() => Some(SecretString::from(raw.trim().to_owned())),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read auth token, treating as signed out");
                None
            }
        }
    }

    /// Whether a credential is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Store a new bearer token.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the token cannot be written.
    pub fn set_token(&self, token: &SecretString) -> StorageResult<()> {
        self.storage.set(TOKEN_KEY, token.expose_secret())
    }

    /// Remove the bearer token.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the token cannot be deleted.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.remove(TOKEN_KEY)
    }
}

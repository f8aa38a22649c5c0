//! Persisted cart snapshot.
//!
//! The whole cart state is written under a single key on every change:
//!
//! ```json
//! { "state": { "items": [], "loading": false, "error": null, "isGuest": true }, "version": 0 }
//! ```
//!
//! `loading` is always persisted as `false` and `error` as `null`; both are
//! transient and reset on rehydration.

use pantry_core::CartItem;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::{CartMode, CartSession};
use crate::storage::{Storage, StorageError};

/// Storage key for the cart snapshot.
pub const CART_STORAGE_KEY: &str = "cart-storage";

/// Schema version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 0;

/// Errors loading or saving a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { found: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    items: Vec<CartItem>,
    #[serde(default)]
    loading: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default = "default_is_guest")]
    is_guest: bool,
}

const fn default_is_guest() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedSnapshot {
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

/// Serialize the durable part of a session.
///
/// # Errors
///
/// Returns a JSON error if serialization fails.
pub fn encode(session: &CartSession) -> Result<String, SnapshotError> {
    let snapshot = PersistedSnapshot {
        state: PersistedState {
            items: session.items.clone(),
            loading: false,
            error: None,
            is_guest: session.mode.is_guest(),
        },
        version: SNAPSHOT_VERSION,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Parse a snapshot into a fresh session.
///
/// Duplicate ids keep the first line; zero-quantity lines are dropped.
///
/// # Errors
///
/// Returns an error for malformed JSON or an unknown schema version.
pub fn decode(raw: &str) -> Result<CartSession, SnapshotError> {
    let snapshot: PersistedSnapshot = serde_json::from_str(raw)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.version,
        });
    }

    let mut items: Vec<CartItem> = Vec::with_capacity(snapshot.state.items.len());
    for item in snapshot.state.items {
        if item.quantity == 0 || items.iter().any(|existing| existing.id == item.id) {
            continue;
        }
        items.push(item);
    }

    Ok(CartSession {
        items,
        mode: CartMode::from_is_guest(snapshot.state.is_guest),
        ..CartSession::default()
    })
}

/// Load the persisted session, falling back to an empty cart.
///
/// Unreadable or incompatible snapshots are logged and discarded.
pub fn load(storage: &dyn Storage) -> CartSession {
    let raw = match storage.get(CART_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No persisted cart, starting empty");
            return CartSession::default();
        }
        Err(e) => {
            warn!(error = %e, "Failed to read persisted cart, starting empty");
            return CartSession::default();
        }
    };

    decode(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding unreadable cart snapshot");
        CartSession::default()
    })
}

/// Write the whole session under [`CART_STORAGE_KEY`].
///
/// # Errors
///
/// Returns an error if encoding or the storage write fails.
pub fn save(storage: &dyn Storage, session: &CartSession) -> Result<(), SnapshotError> {
    let raw = encode(session)?;
    storage.set(CART_STORAGE_KEY, &raw)?;
    Ok(())
}

//! Errors surfaced while wiring up the cart store.
//!
//! Cart operations themselves never fail: backend problems degrade to local
//! mutations and are reported through [`crate::CartSession::error`]. The
//! errors here cover construction, credential storage, and teardown.

use thiserror::Error;

use crate::api::CartApiError;
use crate::config::ConfigError;
use crate::snapshot::SnapshotError;
use crate::storage::StorageError;

/// Top-level error for the cart crate.
#[derive(Debug, Error)]
pub enum CartError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be built.
    #[error("Cart API error: {0}")]
    Api(#[from] CartApiError),

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot could not be written.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

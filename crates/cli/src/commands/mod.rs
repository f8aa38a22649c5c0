//! Command implementations.

pub mod cart;
pub mod session;

use pantry_cart::snapshot::SnapshotError;
use pantry_cart::{CartError, StorageError};
use thiserror::Error;

/// Errors that can end a CLI command.
///
/// Backend failures are not among them: the store absorbs those and keeps
/// working locally.
#[derive(Debug, Error)]
pub enum CliError {
    /// The store could not be opened.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The credential could not be stored or removed.
    #[error("Credential storage error: {0}")]
    Storage(#[from] StorageError),

    /// The cart could not be saved on exit.
    #[error("Failed to save cart: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The cart could not be rendered as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

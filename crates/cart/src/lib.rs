//! Pantry cart session store.
//!
//! A client-side shopping cart that works signed out, mirrors the backend
//! cart once signed in, and survives restarts through a persisted snapshot.
//!
//! The entry point is [`CartStore`]:
//!
//! ```no_run
//! use pantry_cart::{CartConfig, CartStore};
//!
//! # async fn demo() -> Result<(), pantry_cart::CartError> {
//! let config = CartConfig::from_env()?;
//! let store = CartStore::from_config(&config)?;
//! store.fetch_cart().await;
//! println!("{} items", store.item_count());
//! store.close()?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod notify;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod store;
pub mod view;

pub use api::{CartApi, CartApiError, HttpCartApi};
pub use auth::AuthSession;
pub use config::{CartConfig, ConfigError};
pub use error::{CartError, Result};
pub use notify::{Notification, NotificationKind, Notifier};
pub use state::{CartMode, CartSession, SyncPhase};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use store::{CartStore, StoreSettings, SyncReport};
pub use view::{CartItemView, CartView};

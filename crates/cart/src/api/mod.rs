//! Backend cart REST API client.
//!
//! # Architecture
//!
//! - The backend is the source of truth for authenticated carts; every
//!   successful mutation returns the authoritative item list
//! - [`CartApi`] is the seam the store talks to, so tests can script
//!   failures without a network
//! - [`HttpCartApi`] is the `reqwest` implementation of the REST contract
//!
//! # Endpoints
//!
//! | Operation | Method | Path |
//! |---|---|---|
//! | Fetch cart | GET | `cart` |
//! | Add item | POST | `cart/add` |
//! | Remove item | DELETE | `cart/remove/:productId` |
//! | Update quantity | PUT | `cart/update/:productId` |
//! | Clear cart | DELETE | `cart/clear` |

mod conversions;
mod http;

pub use conversions::{parse_ack, parse_cart_items};
pub use http::HttpCartApi;

use async_trait::async_trait;
use pantry_core::{CartItem, ItemId};
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur when talking to the backend cart API.
#[derive(Debug, Error)]
pub enum CartApiError {
    /// Transport failure (connect, DNS, TLS, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status code.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Backend answered `success: false`.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Response was JSON but not the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Response body was not JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl CartApiError {
    /// Whether the request never got an HTTP answer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Whether the backend refused the credential.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// Backend cart operations.
///
/// Every mutation except `clear` returns the server's full item list.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// `GET /cart`
    async fn fetch(&self, token: &SecretString) -> Result<Vec<CartItem>, CartApiError>;

    /// `POST /cart/add`
    async fn add(
        &self,
        token: &SecretString,
        id: &ItemId,
        quantity: u32,
    ) -> Result<Vec<CartItem>, CartApiError>;

    /// `DELETE /cart/remove/:productId`
    async fn remove(&self, token: &SecretString, id: &ItemId)
    -> Result<Vec<CartItem>, CartApiError>;

    /// `PUT /cart/update/:productId`
    async fn update(
        &self,
        token: &SecretString,
        id: &ItemId,
        quantity: u32,
    ) -> Result<Vec<CartItem>, CartApiError>;

    /// `DELETE /cart/clear`
    async fn clear(&self, token: &SecretString) -> Result<(), CartApiError>;
}

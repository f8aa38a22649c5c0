//! `reqwest` implementation of the backend cart API.

use std::sync::Arc;

use async_trait::async_trait;
use pantry_core::{CartItem, ItemId};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use super::conversions::{parse_ack, parse_cart_items};
use super::{CartApi, CartApiError};
use crate::config::CartConfig;

/// Truncate response bodies in logs and error messages.
const BODY_PREVIEW_CHARS: usize = 200;

/// Client for the backend cart endpoints.
#[derive(Clone)]
pub struct HttpCartApi {
    inner: Arc<HttpCartApiInner>,
}

struct HttpCartApiInner {
    client: reqwest::Client,
    base_url: Url,
}

impl std::fmt::Debug for HttpCartApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartApi")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpCartApi {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `CartApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &CartConfig) -> Result<Self, CartApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, config.api_base_url.clone()))
    }

    /// Create a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            inner: Arc::new(HttpCartApiInner { client, base_url }),
        }
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, CartApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| CartApiError::Malformed(format!("invalid endpoint {path}: {e}")))
    }

    fn item_endpoint(&self, prefix: &str, id: &ItemId) -> Result<Url, CartApiError> {
        let mut url = self.endpoint(prefix)?;
        url.path_segments_mut()
            .map_err(|()| CartApiError::Malformed("base URL cannot have segments".to_string()))?
            .pop_if_empty()
            .push(id.as_str());
        Ok(url)
    }

    /// Send a request and return the body of a successful response.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        token: &SecretString,
        body: Option<serde_json::Value>,
    ) -> Result<String, CartApiError> {
        let mut request = self
            .inner
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            let preview = preview(&response_text);
            tracing::warn!(
                status = %status,
                body = %preview,
                "Cart API returned non-success status"
            );
            let message = serde_json::from_str::<serde_json::Value>(&response_text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
                .unwrap_or(preview);
            return Err(CartApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        debug!(status = %status, bytes = response_text.len(), "Cart API response");
        Ok(response_text)
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[async_trait]
impl CartApi for HttpCartApi {
    #[instrument(skip(self, token))]
    async fn fetch(&self, token: &SecretString) -> Result<Vec<CartItem>, CartApiError> {
        let url = self.endpoint("cart")?;
        let body = self.execute(Method::GET, url, token, None).await?;
        parse_cart_items(&body)
    }

    #[instrument(skip(self, token, id), fields(id = %id))]
    async fn add(
        &self,
        token: &SecretString,
        id: &ItemId,
        quantity: u32,
    ) -> Result<Vec<CartItem>, CartApiError> {
        let url = self.endpoint("cart/add")?;
        let payload = json!({ "productId": id, "quantity": quantity });
        let body = self.execute(Method::POST, url, token, Some(payload)).await?;
        parse_cart_items(&body)
    }

    #[instrument(skip(self, token, id), fields(id = %id))]
    async fn remove(
        &self,
        token: &SecretString,
        id: &ItemId,
    ) -> Result<Vec<CartItem>, CartApiError> {
        let url = self.item_endpoint("cart/remove", id)?;
        let body = self.execute(Method::DELETE, url, token, None).await?;
        parse_cart_items(&body)
    }

    #[instrument(skip(self, token, id), fields(id = %id))]
    async fn update(
        &self,
        token: &SecretString,
        id: &ItemId,
        quantity: u32,
    ) -> Result<Vec<CartItem>, CartApiError> {
        let url = self.item_endpoint("cart/update", id)?;
        let payload = json!({ "quantity": quantity });
        let body = self.execute(Method::PUT, url, token, Some(payload)).await?;
        parse_cart_items(&body)
    }

    #[instrument(skip(self, token))]
    async fn clear(&self, token: &SecretString) -> Result<(), CartApiError> {
        let url = self.endpoint("cart/clear")?;
        let body = self.execute(Method::DELETE, url, token, None).await?;
        parse_ack(&body)
    }
}

//! Integration tests for the Pantry cart store.
//!
//! The tests drive the real [`pantry_cart::HttpCartApi`] and
//! [`pantry_cart::CartStore`] against [`MockBackend`], an `axum` server that
//! implements the backend cart REST contract on an ephemeral local port.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pantry-integration-tests
//! ```
//!
//! # Mock Backend Behavior
//!
//! - Requests need `Authorization: Bearer <token>` matching
//!   [`MockBackend::TOKEN`], otherwise `401`
//! - `POST /cart/add` sums quantities into an existing line
//! - Unknown products are refused with `404 { success: false }`
//! - [`MockBackend::fail_with`] makes every request answer with a status
//! - Responses use the populated-product line shape

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use pantry_cart::{CartConfig, CartStore, HttpCartApi, MemoryStorage, Storage, StoreSettings};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A product the mock backend knows about.
#[derive(Debug, Clone)]
pub struct CatalogProduct {
    pub name: String,
    pub price: f64,
    pub category: Option<String>,
}

#[derive(Debug, Default)]
struct BackendInner {
    catalog: HashMap<String, CatalogProduct>,
    cart: Vec<(String, u32)>,
    failure: Option<StatusCode>,
    requests: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct BackendState {
    inner: Arc<Mutex<BackendInner>>,
}

impl BackendState {
    fn lock(&self) -> MutexGuard<'_, BackendInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the request and check the simulated failure and credential.
    fn admit(&self, request: &str, headers: &HeaderMap) -> Result<MutexGuard<'_, BackendInner>, Response> {
        let mut inner = self.lock();
        inner.requests.push(request.to_string());

        if let Some(status) = inner.failure {
            return Err(failure(status, "Simulated outage"));
        }

        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| token == MockBackend::TOKEN);
        if !authorized {
            return Err(failure(StatusCode::UNAUTHORIZED, "Not authorized, token failed"));
        }

        Ok(inner)
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

fn cart_body(inner: &BackendInner) -> Response {
    let items: Vec<Value> = inner
        .cart
        .iter()
        .enumerate()
        .map(|(index, (id, quantity))| {
            let product = inner.catalog.get(id);
            json!({
                "_id": format!("line-{index}"),
                "product": {
                    "_id": id,
                    "name": product.map_or(id.as_str(), |p| p.name.as_str()),
                    "price": product.map_or(0.0, |p| p.price),
                    "images": [format!("https://cdn.example.com/{id}.png")],
                    "category": product
                        .and_then(|p| p.category.as_ref())
                        .map(|name| json!({ "_id": format!("cat-{name}"), "name": name })),
                },
                "quantity": quantity,
            })
        })
        .collect();

    Json(json!({
        "success": true,
        "data": { "cart": { "_id": "cart-1", "items": items } },
    }))
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddRequest {
    product_id: String,
    quantity: u32,
}

#[derive(Deserialize)]
struct UpdateRequest {
    quantity: u32,
}

async fn fetch_cart(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    match state.admit("GET cart", &headers) {
        Ok(inner) => cart_body(&inner),
        Err(response) => response,
    }
}

async fn add_item(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Json(body): Json<AddRequest>,
) -> Response {
    let mut inner = match state.admit("POST cart/add", &headers) {
        Ok(inner) => inner,
        Err(response) => return response,
    };
    if !inner.catalog.contains_key(&body.product_id) {
        return failure(StatusCode::NOT_FOUND, "Product not found");
    }

    if let Some((_, quantity)) = inner.cart.iter_mut().find(|(id, _)| *id == body.product_id) {
        *quantity += body.quantity;
    } else {
        inner.cart.push((body.product_id, body.quantity));
    }
    cart_body(&inner)
}

async fn remove_item(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Response {
    let mut inner = match state.admit("DELETE cart/remove", &headers) {
        Ok(inner) => inner,
        Err(response) => return response,
    };
    inner.cart.retain(|(id, _)| *id != product_id);
    cart_body(&inner)
}

async fn update_item(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> Response {
    let mut inner = match state.admit("PUT cart/update", &headers) {
        Ok(inner) => inner,
        Err(response) => return response,
    };
    match inner.cart.iter_mut().find(|(id, _)| *id == product_id) {
        Some((_, quantity)) => *quantity = body.quantity,
        None => return failure(StatusCode::NOT_FOUND, "Item not in cart"),
    }
    cart_body(&inner)
}

async fn clear_cart(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    let mut inner = match state.admit("DELETE cart/clear", &headers) {
        Ok(inner) => inner,
        Err(response) => return response,
    };
    inner.cart.clear();
    Json(json!({ "success": true, "message": "Cart cleared" })).into_response()
}

/// In-process backend serving the cart REST API under `/api`.
#[derive(Debug)]
pub struct MockBackend {
    addr: SocketAddr,
    state: BackendState,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// The only bearer token the backend accepts.
    pub const TOKEN: &'static str = "test-jwt";

    /// Start the backend on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = BackendState::default();
        let app = Router::new()
            .route("/api/cart", get(fetch_cart))
            .route("/api/cart/add", post(add_item))
            .route("/api/cart/remove/{product_id}", delete(remove_item))
            .route("/api/cart/update/{product_id}", put(update_item))
            .route("/api/cart/clear", delete(clear_cart))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock backend stopped");
            }
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    /// Base URL to point a [`CartConfig`] at.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    /// Client configuration targeting this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse.
    pub fn config(&self) -> Result<CartConfig, pantry_cart::ConfigError> {
        CartConfig::with_base_url(&self.base_url())
    }

    /// HTTP client targeting this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn api(&self) -> Result<HttpCartApi, pantry_cart::CartError> {
        Ok(HttpCartApi::new(&self.config()?)?)
    }

    /// Cart store backed by this server and in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn store(&self) -> Result<(CartStore, Arc<dyn Storage>), pantry_cart::CartError> {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = CartStore::open(
            Arc::new(self.api()?),
            Arc::clone(&storage),
            StoreSettings::default(),
        );
        Ok((store, storage))
    }

    /// Register a product the backend will accept in `POST /cart/add`.
    pub fn add_product(&self, id: &str, name: &str, price: f64, category: Option<&str>) {
        self.state.lock().catalog.insert(
            id.to_string(),
            CatalogProduct {
                name: name.to_string(),
                price,
                category: category.map(str::to_owned),
            },
        );
    }

    /// Put a line directly into the server cart.
    pub fn seed_cart(&self, id: &str, quantity: u32) {
        self.state.lock().cart.push((id.to_string(), quantity));
    }

    /// Server cart as `(product id, quantity)` pairs.
    #[must_use]
    pub fn cart(&self) -> Vec<(String, u32)> {
        self.state.lock().cart.clone()
    }

    /// Answer every request with `status` until [`Self::recover`].
    pub fn fail_with(&self, status: StatusCode) {
        self.state.lock().failure = Some(status);
    }

    pub fn recover(&self) {
        self.state.lock().failure = None;
    }

    /// Requests received so far, e.g. `"POST cart/add"`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    /// A base URL nothing is listening on.
    ///
    /// # Errors
    ///
    /// Returns an error if a probe listener cannot be bound.
    pub async fn unreachable_url() -> std::io::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);
        Ok(format!("http://{addr}/api/"))
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

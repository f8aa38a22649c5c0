//! The cart session store.
//!
//! [`CartStore`] is the single source of truth for the shopping cart. It is
//! constructed explicitly with its collaborators (backend API, durable
//! storage) and handed to whoever needs it; there is no global instance.
//!
//! # Modes
//!
//! - **Guest**: mutations only touch local state.
//! - **Authenticated**: mutations go to the backend first and adopt the
//!   server's item list. Any failure degrades the operation to its local
//!   equivalent and flips the store to guest until the next successful
//!   [`CartStore::fetch_cart`] or [`CartStore::sync_cart_to_backend`].
//!
//! No operation returns an error. Failures are recorded in
//! [`CartSession::error`] and logged.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pantry_core::{CartItem, CurrencyCode, ItemId, ProductDescriptor, item_count, total};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::api::{CartApi, CartApiError, HttpCartApi};
use crate::auth::AuthSession;
use crate::config::CartConfig;
use crate::error::Result;
use crate::notify::{Notification, Notifier};
use crate::snapshot::{self, SnapshotError};
use crate::state::{CartMode, CartSession, SyncPhase, SyncTracker, Ticket};
use crate::storage::{FileStorage, Storage, StorageError};
use crate::view::CartView;

/// Tunables for a [`CartStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// How long add-to-cart notifications stay visible.
    pub notification_ttl: Duration,
    /// Currency for [`CartStore::summary`].
    pub currency: CurrencyCode,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            notification_ttl: Duration::from_secs(3),
            currency: CurrencyCode::default(),
        }
    }
}

impl From<&CartConfig> for StoreSettings {
    fn from(config: &CartConfig) -> Self {
        Self {
            notification_ttl: config.notification_ttl,
            currency: config.currency,
        }
    }
}

/// Outcome of a guest-to-server reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Whether the preconditions held and the sync ran.
    pub performed: bool,
    /// Local lines pushed to the backend successfully.
    pub synced: usize,
    /// Local lines the backend refused or never answered for.
    pub failed: usize,
}

struct StoreInner {
    session: CartSession,
    tracker: SyncTracker,
}

/// Persisted, backend-synced shopping cart.
pub struct CartStore {
    api: Arc<dyn CartApi>,
    storage: Arc<dyn Storage>,
    auth: AuthSession,
    notifier: Notifier,
    currency: CurrencyCode,
    inner: Mutex<StoreInner>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("session", &self.session())
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Open a store, rehydrating the cart from `storage`.
    #[must_use]
    pub fn open(api: Arc<dyn CartApi>, storage: Arc<dyn Storage>, settings: StoreSettings) -> Self {
        let session = snapshot::load(storage.as_ref());
        info!(
            items = session.items.len(),
            mode = ?session.mode,
            "Cart store opened"
        );

        Self {
            api,
            auth: AuthSession::new(Arc::clone(&storage)),
            storage,
            notifier: Notifier::new(settings.notification_ttl),
            currency: settings.currency,
            inner: Mutex::new(StoreInner {
                session,
                tracker: SyncTracker::default(),
            }),
        }
    }

    /// Open a store backed by the HTTP API and a file storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the storage
    /// directory cannot be created.
    pub fn from_config(config: &CartConfig) -> Result<Self> {
        let api = HttpCartApi::new(config)?;
        let storage = FileStorage::open(&config.storage_dir)?;
        debug!(dir = %storage.root().display(), "Using file storage");
        Ok(Self::open(
            Arc::new(api),
            Arc::new(storage),
            StoreSettings::from(config),
        ))
    }

    /// Persist the final state and tear the store down.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn close(self) -> std::result::Result<(), SnapshotError> {
        let session = self.session();
        snapshot::save(self.storage.as_ref(), &session)?;
        debug!("Cart store closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> CartSession {
        self.lock().session.clone()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.lock().session.items.clone()
    }

    #[must_use]
    pub fn mode(&self) -> CartMode {
        self.lock().session.mode
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.lock().session.phase
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().session.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().session.error.clone()
    }

    /// Sum of `price * quantity` over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        total(&self.lock().session.items)
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        item_count(&self.lock().session.items)
    }

    /// Display view with formatted prices.
    #[must_use]
    pub fn summary(&self) -> CartView {
        CartView::from_session(&self.lock().session, self.currency)
    }

    /// Subscribe to add-to-cart notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// The credential source used to pick guest or authenticated behavior.
    #[must_use]
    pub const fn auth(&self) -> &AuthSession {
        &self.auth
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a product, or bump the quantity of an existing line.
    ///
    /// The line grows by [`ProductDescriptor::quantity`] when it is at least
    /// one, and by a single unit otherwise. A notification is broadcast once
    /// the line has landed, on the server or locally.
    #[instrument(skip(self, product), fields(id = %product.id))]
    pub async fn add_item(&self, product: ProductDescriptor) {
        let quantity = product.requested_quantity();

        let landed = if let Some((token, ticket)) = self.begin_server_call() {
            match self.api.add(&token, &product.id, quantity).await {
                Ok(items) => {
                    self.adopt(ticket, items, None);
                    true
                }
                Err(e) => self.degrade(ticket, "add item", &e, |items| {
                    add_local(items, &product, quantity);
                }),
            }
        } else {
            self.mutate_locally(|items| add_local(items, &product, quantity));
            true
        };

        if landed {
            self.notifier.item_added(&product.name);
        }
    }

    /// Remove a line. Unknown ids are ignored.
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn remove_item(&self, id: &ItemId) {
        if !self.contains(id) {
            debug!("Item not in cart, nothing to remove");
            return;
        }

        let remove = |items: &mut Vec<CartItem>| items.retain(|item| &item.id != id);

        if let Some((token, ticket)) = self.begin_server_call() {
            match self.api.remove(&token, id).await {
                Ok(items) => self.adopt(ticket, items, None),
                Err(e) => {
                    self.degrade(ticket, "remove item", &e, remove);
                }
            }
        } else {
            self.mutate_locally(remove);
        }
    }

    /// Set a line's quantity.
    ///
    /// Quantities below one are rejected without any state change, as are
    /// ids that are not in the cart.
    #[instrument(skip(self, id), fields(id = %id))]
    pub async fn update_quantity(&self, id: &ItemId, quantity: i64) {
        let Some(quantity) = u32::try_from(quantity).ok().filter(|q| *q >= 1) else {
            debug!(quantity, "Rejected quantity update");
            return;
        };
        if !self.contains(id) {
            debug!("Item not in cart, nothing to update");
            return;
        }

        let update = |items: &mut Vec<CartItem>| {
            if let Some(item) = items.iter_mut().find(|item| &item.id == id) {
                item.quantity = quantity;
            }
        };

        if let Some((token, ticket)) = self.begin_server_call() {
            match self.api.update(&token, id, quantity).await {
                Ok(items) => self.adopt(ticket, items, None),
                Err(e) => {
                    self.degrade(ticket, "update quantity", &e, update);
                }
            }
        } else {
            self.mutate_locally(update);
        }
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) {
        if let Some((token, ticket)) = self.begin_server_call() {
            match self.api.clear(&token).await {
                Ok(()) => self.adopt(ticket, Vec::new(), None),
                Err(e) => {
                    self.degrade(ticket, "clear cart", &e, Vec::clear);
                }
            }
        } else {
            self.mutate_locally(Vec::clear);
        }
    }

    /// Load the server cart.
    ///
    /// Without a credential the local cart is kept and the store is marked
    /// guest. With one, the server's items replace the local ones; if the
    /// request fails the local items are kept (the store fails open).
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) {
        let Some(token) = self.auth.token() else {
            let mut inner = self.lock();
            inner.session.mode = CartMode::Guest;
            self.persist(&inner.session);
            return;
        };

        let ticket = self.begin();
        match self.api.fetch(&token).await {
            Ok(items) => self.adopt(ticket, items, Some(CartMode::Authenticated)),
            Err(e) => {
                self.degrade(ticket, "fetch cart", &e, |_| {});
            }
        }
    }

    /// Push the local guest cart to the backend, then adopt the merged
    /// server cart.
    ///
    /// Runs only with a credential present, in guest mode, with a non-empty
    /// cart. Lines are pushed one by one with `add`; a failing line is logged
    /// and skipped. Whether quantities sum with an existing server line is up
    /// to the backend.
    #[instrument(skip(self))]
    pub async fn sync_cart_to_backend(&self) -> SyncReport {
        let Some(token) = self.auth.token() else {
            return SyncReport::default();
        };

        let pending = {
            let inner = self.lock();
            if !inner.session.mode.is_guest() || inner.session.items.is_empty() {
                return SyncReport::default();
            }
            inner.session.items.clone()
        };

        info!(lines = pending.len(), "Syncing guest cart to backend");
        let mut report = SyncReport {
            performed: true,
            ..SyncReport::default()
        };

        for item in &pending {
            let ticket = self.begin();
            let result = self.api.add(&token, &item.id, item.quantity).await;

            let mut inner = self.lock();
            let StoreInner { session, tracker } = &mut *inner;
            tracker.finish(session, result.is_ok());
            match result {
                Ok(_) => report.synced += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(id = %item.id, error = %e, "Failed to sync cart line, continuing");
                }
            }
            if !tracker.is_current(ticket) {
                info!("Cart was wiped during sync, stopping");
                return report;
            }
        }

        info!(synced = report.synced, failed = report.failed, "Guest cart synced");
        self.fetch_cart().await;
        report
    }

    /// Wipe the cart in memory and in storage.
    ///
    /// Used on logout so one user's cart never leaks into the next guest
    /// session. Responses to requests still in flight are discarded.
    #[instrument(skip(self))]
    pub fn clear_local_cart(&self) {
        let mut inner = self.lock();
        let StoreInner { session, tracker } = &mut *inner;
        tracker.reset(session);
        session.items.clear();
        session.mode = CartMode::Authenticated;
        session.error = None;
        self.persist(session);
        info!(in_flight = tracker.in_flight(), "Local cart cleared");
    }

    /// Store a credential and reconcile the guest cart with the backend.
    ///
    /// If there is nothing to reconcile the server cart is fetched instead.
    ///
    /// # Errors
    ///
    /// Returns an error only if the credential cannot be stored.
    pub async fn login(
        &self,
        token: &SecretString,
    ) -> std::result::Result<SyncReport, StorageError> {
        self.auth.set_token(token)?;
        let report = self.sync_cart_to_backend().await;
        if !report.performed {
            self.fetch_cart().await;
        }
        Ok(report)
    }

    /// Drop the credential and wipe the cart.
    ///
    /// The cart is wiped even if removing the credential fails.
    ///
    /// # Errors
    ///
    /// Returns the storage error from removing the credential.
    pub fn logout(&self) -> std::result::Result<(), StorageError> {
        let removed = self.auth.clear();
        self.clear_local_cart();
        removed
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn contains(&self, id: &ItemId) -> bool {
        self.lock().session.items.iter().any(|item| &item.id == id)
    }

    fn begin(&self) -> Ticket {
        let mut inner = self.lock();
        let StoreInner { session, tracker } = &mut *inner;
        tracker.begin(session)
    }

    /// Start a backend call if a credential is present and the store is in
    /// authenticated mode.
    fn begin_server_call(&self) -> Option<(SecretString, Ticket)> {
        let token = self.auth.token()?;
        if self.mode().is_guest() {
            return None;
        }
        Some((token, self.begin()))
    }

    fn mutate_locally<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Vec<CartItem>),
    {
        let mut inner = self.lock();
        let StoreInner { session, tracker } = &mut *inner;
        mutate(&mut session.items);
        tracker.mark_local_write();
        session.mode = CartMode::Guest;
        session.error = None;
        self.persist(session);
    }

    fn adopt(&self, ticket: Ticket, items: Vec<CartItem>, mode: Option<CartMode>) {
        let mut inner = self.lock();
        let StoreInner { session, tracker } = &mut *inner;
        tracker.finish(session, true);

        if tracker.can_adopt(ticket) {
            tracker.mark_adopted(ticket);
            session.items = items;
            if let Some(mode) = mode {
                session.mode = mode;
            }
            session.error = None;
        } else {
            debug!(seq = ticket.seq(), "Dropping stale server cart");
        }

        self.persist(session);
    }

    /// Complete a failed backend call locally. Returns whether the fallback
    /// was applied.
    fn degrade<F>(&self, ticket: Ticket, operation: &str, error: &CartApiError, fallback: F) -> bool
    where
        F: FnOnce(&mut Vec<CartItem>),
    {
        let mut inner = self.lock();
        let StoreInner { session, tracker } = &mut *inner;
        tracker.finish(session, false);

        if !tracker.is_current(ticket) {
            debug!(operation, "Cart was wiped while request was in flight, skipping fallback");
            return false;
        }

        warn!(
            operation,
            error = %error,
            transport = error.is_transport(),
            unauthorized = error.is_unauthorized(),
            "Cart API failed, continuing in guest mode"
        );
        fallback(&mut session.items);
        tracker.mark_local_write();
        session.mode = CartMode::Guest;
        session.error = Some(format!("{operation} failed: {error}"));
        self.persist(session);
        true
    }

    fn persist(&self, session: &CartSession) {
        if let Err(e) = snapshot::save(self.storage.as_ref(), session) {
            warn!(error = %e, "Failed to persist cart snapshot");
        }
    }
}

/// Add `quantity` units of `product`, merging with an existing line.
fn add_local(items: &mut Vec<CartItem>, product: &ProductDescriptor, quantity: u32) {
    if let Some(existing) = items.iter_mut().find(|item| item.id == product.id) {
        existing.quantity = existing.quantity.saturating_add(quantity);
    } else {
        items.push(product.to_item(quantity));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use secrecy::ExposeSecret;
    use serde_json::Value;
    use tokio::sync::oneshot;

    use super::*;
    use crate::snapshot::CART_STORAGE_KEY;
    use crate::storage::MemoryStorage;

    const TOKEN: &str = "jwt-valid";

    fn id(raw: &str) -> ItemId {
        ItemId::parse(raw).unwrap()
    }

    fn catalog(item_id: &ItemId) -> (String, Decimal) {
        match item_id.as_str() {
            "ladoo" => ("Coconut Ladoo".to_string(), Decimal::new(12550, 2)),
            "chips" => ("Banana Chips".to_string(), Decimal::from(50)),
            "chikki" => ("Peanut Chikki".to_string(), Decimal::from(40)),
            other => (other.to_string(), Decimal::ZERO),
        }
    }

    fn product(raw: &str) -> ProductDescriptor {
        let item_id = id(raw);
        let (name, price) = catalog(&item_id);
        ProductDescriptor::new(item_id, name, price)
    }

    fn line(raw: &str, quantity: u32) -> CartItem {
        product(raw).to_item(quantity)
    }

    /// In-memory backend with an additive server cart.
    #[derive(Default)]
    struct FakeBackend {
        cart: Mutex<Vec<CartItem>>,
        failing: AtomicBool,
        rejected: Mutex<Vec<ItemId>>,
        calls: AtomicUsize,
        fetch_gate: Mutex<Option<oneshot::Receiver<()>>>,
        add_gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl FakeBackend {
        fn with_cart(items: Vec<CartItem>) -> Arc<Self> {
            let backend = Self::default();
            *backend.cart.lock().unwrap() = items;
            Arc::new(backend)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn reject(&self, raw: &str) {
            self.rejected.lock().unwrap().push(id(raw));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn server_items(&self) -> Vec<CartItem> {
            self.cart.lock().unwrap().clone()
        }

        /// Hold the next fetch response until `gate` fires. The response
        /// reflects the server cart at the time the request arrived.
        fn gate_next_fetch(&self, gate: oneshot::Receiver<()>) {
            *self.fetch_gate.lock().unwrap() = Some(gate);
        }

        /// Hold the next add response until `gate` fires.
        fn gate_next_add(&self, gate: oneshot::Receiver<()>) {
            *self.add_gate.lock().unwrap() = Some(gate);
        }

        fn apply_add(&self, item_id: &ItemId, quantity: u32) -> std::result::Result<Vec<CartItem>, CartApiError> {
            if self.rejected.lock().unwrap().contains(item_id) {
                return Err(CartApiError::Rejected("Product out of stock".to_string()));
            }
            let mut cart = self.cart.lock().unwrap();
            if let Some(existing) = cart.iter_mut().find(|item| &item.id == item_id) {
                existing.quantity += quantity;
            } else {
                cart.push(line(item_id.as_str(), quantity));
            }
            Ok(cart.clone())
        }

        fn check(&self, token: &SecretString) -> std::result::Result<(), CartApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token.expose_secret() != TOKEN {
                return Err(CartApiError::Status {
                    status: 401,
                    message: "Token expired".to_string(),
                });
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(CartApiError::Status {
                    status: 503,
                    message: "Service Unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CartApi for FakeBackend {
        async fn fetch(&self, token: &SecretString) -> std::result::Result<Vec<CartItem>, CartApiError> {
            let outcome = self.check(token).map(|()| self.server_items());
            let gate = self.fetch_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            outcome
        }

        async fn add(
            &self,
            token: &SecretString,
            item_id: &ItemId,
            quantity: u32,
        ) -> std::result::Result<Vec<CartItem>, CartApiError> {
            let outcome = self
                .check(token)
                .and_then(|()| self.apply_add(item_id, quantity));
            let gate = self.add_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            outcome
        }

        async fn remove(
            &self,
            token: &SecretString,
            item_id: &ItemId,
        ) -> std::result::Result<Vec<CartItem>, CartApiError> {
            self.check(token)?;
            let mut cart = self.cart.lock().unwrap();
            cart.retain(|item| &item.id != item_id);
            Ok(cart.clone())
        }

        async fn update(
            &self,
            token: &SecretString,
            item_id: &ItemId,
            quantity: u32,
        ) -> std::result::Result<Vec<CartItem>, CartApiError> {
            self.check(token)?;
            let mut cart = self.cart.lock().unwrap();
            if let Some(existing) = cart.iter_mut().find(|item| &item.id == item_id) {
                existing.quantity = quantity;
            }
            Ok(cart.clone())
        }

        async fn clear(&self, token: &SecretString) -> std::result::Result<(), CartApiError> {
            self.check(token)?;
            self.cart.lock().unwrap().clear();
            Ok(())
        }
    }

    fn open_on(backend: &Arc<FakeBackend>, storage: Arc<dyn Storage>) -> CartStore {
        let api: Arc<dyn CartApi> = Arc::clone(backend) as Arc<dyn CartApi>;
        CartStore::open(api, storage, StoreSettings::default())
    }

    fn guest_store(backend: &Arc<FakeBackend>) -> CartStore {
        open_on(backend, Arc::new(MemoryStorage::new()))
    }

    async fn signed_in_store(backend: &Arc<FakeBackend>) -> CartStore {
        let store = guest_store(backend);
        store.auth().set_token(&SecretString::from(TOKEN)).unwrap();
        store.fetch_cart().await;
        assert_eq!(store.mode(), CartMode::Authenticated);
        store
    }

    fn persisted(storage: &dyn Storage) -> Value {
        serde_json::from_str(&storage.get(CART_STORAGE_KEY).unwrap().unwrap()).unwrap()
    }

    // =========================================================================
    // Guest mode
    // =========================================================================

    #[tokio::test]
    async fn test_guest_add_merges_lines_without_backend() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = guest_store(&backend);

        store.add_item(product("ladoo")).await;
        store.add_item(product("ladoo")).await;
        store.add_item(product("chips").with_quantity(3)).await;

        let items = store.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].quantity, 3);
        assert_eq!(store.item_count(), 5);
        assert_eq!(store.mode(), CartMode::Guest);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_guest_totals() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = guest_store(&backend);

        store.add_item(product("ladoo").with_quantity(2)).await;
        store.add_item(product("chips")).await;

        assert_eq!(store.total(), Decimal::from(301));
        let summary = store.summary();
        assert_eq!(summary.subtotal, "₹301.00");
        assert_eq!(summary.item_count, 3);
    }

    #[tokio::test]
    async fn test_update_quantity_rejects_invalid_values() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = guest_store(&backend);
        store.add_item(product("ladoo")).await;

        store.update_quantity(&id("ladoo"), 0).await;
        store.update_quantity(&id("ladoo"), -4).await;
        store.update_quantity(&id("ladoo"), i64::from(u32::MAX) + 1).await;
        assert_eq!(store.items()[0].quantity, 1);

        store.update_quantity(&id("ladoo"), 6).await;
        assert_eq!(store.items()[0].quantity, 6);

        store.update_quantity(&id("missing"), 2).await;
        assert_eq!(store.items().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = guest_store(&backend);
        store.add_item(product("ladoo")).await;
        store.add_item(product("chips")).await;

        store.remove_item(&id("missing")).await;
        assert_eq!(store.items().len(), 2);

        store.remove_item(&id("ladoo")).await;
        assert_eq!(store.items(), vec![line("chips", 1)]);

        store.clear_cart().await;
        assert!(store.items().is_empty());
        assert_eq!(store.total(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_add_broadcasts_notification() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = guest_store(&backend);
        let mut notifications = store.subscribe();

        store.add_item(product("chikki")).await;

        let notification = notifications.try_recv().unwrap();
        assert_eq!(notification.message, "Peanut Chikki added to cart!");
        assert_eq!(notification.dismiss_after, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_fetch_without_credential_keeps_local_cart() {
        let backend = FakeBackend::with_cart(vec![line("chips", 4)]);
        let store = guest_store(&backend);
        store.add_item(product("ladoo")).await;

        store.fetch_cart().await;

        assert_eq!(store.items(), vec![line("ladoo", 1)]);
        assert_eq!(store.mode(), CartMode::Guest);
        assert_eq!(backend.calls(), 0);
    }

    // =========================================================================
    // Authenticated mode
    // =========================================================================

    #[tokio::test]
    async fn test_authenticated_mutations_adopt_server_cart() {
        let backend = FakeBackend::with_cart(vec![line("chips", 1)]);
        let store = signed_in_store(&backend).await;
        assert_eq!(store.items(), vec![line("chips", 1)]);

        store.add_item(product("ladoo").with_quantity(2)).await;
        assert_eq!(store.items(), backend.server_items());

        store.update_quantity(&id("chips"), 5).await;
        store.remove_item(&id("ladoo")).await;
        assert_eq!(store.items(), vec![line("chips", 5)]);
        assert_eq!(backend.server_items(), vec![line("chips", 5)]);

        store.clear_cart().await;
        assert!(store.items().is_empty());
        assert!(backend.server_items().is_empty());

        assert_eq!(store.mode(), CartMode::Authenticated);
        assert_eq!(store.phase(), SyncPhase::Idle);
        assert!(!store.is_loading());
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_local_mutation() {
        let backend = FakeBackend::with_cart(vec![line("chips", 1)]);
        let store = signed_in_store(&backend).await;
        backend.set_failing(true);

        store.add_item(product("ladoo")).await;

        assert_eq!(store.items(), vec![line("chips", 1), line("ladoo", 1)]);
        assert_eq!(store.mode(), CartMode::Guest);
        assert_eq!(store.phase(), SyncPhase::Degraded);
        assert!(!store.is_loading());
        assert!(store.error().unwrap().contains("503"));
        assert_eq!(backend.server_items(), vec![line("chips", 1)]);
    }

    #[tokio::test]
    async fn test_degraded_store_stays_local_until_fetch_succeeds() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = signed_in_store(&backend).await;
        backend.set_failing(true);
        store.add_item(product("ladoo")).await;
        let calls = backend.calls();

        store.add_item(product("chips")).await;
        assert_eq!(backend.calls(), calls);
        assert!(store.error().is_none());

        backend.set_failing(false);
        store.fetch_cart().await;
        assert_eq!(store.mode(), CartMode::Authenticated);
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_local_items() {
        let backend = FakeBackend::with_cart(vec![line("chips", 1)]);
        let store = signed_in_store(&backend).await;
        backend.set_failing(true);

        store.fetch_cart().await;

        assert_eq!(store.items(), vec![line("chips", 1)]);
        assert_eq!(store.mode(), CartMode::Guest);
        assert!(store.error().is_some());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_rejected_credential_degrades() {
        let backend = FakeBackend::with_cart(vec![line("chips", 1)]);
        let store = guest_store(&backend);
        store.add_item(product("ladoo")).await;
        store.auth().set_token(&SecretString::from("jwt-expired")).unwrap();

        store.fetch_cart().await;

        assert_eq!(store.items(), vec![line("ladoo", 1)]);
        assert_eq!(store.mode(), CartMode::Guest);
        assert!(store.error().unwrap().contains("401"));
    }

    // =========================================================================
    // Sync and session lifecycle
    // =========================================================================

    #[tokio::test]
    async fn test_login_pushes_guest_cart_and_adopts_merged_cart() {
        let backend = FakeBackend::with_cart(vec![line("ladoo", 1)]);
        let store = guest_store(&backend);
        store.add_item(product("ladoo").with_quantity(2)).await;
        store.add_item(product("chips")).await;

        let report = store.login(&SecretString::from(TOKEN)).await.unwrap();

        assert_eq!(
            report,
            SyncReport {
                performed: true,
                synced: 2,
                failed: 0,
            }
        );
        assert_eq!(store.items(), vec![line("ladoo", 3), line("chips", 1)]);
        assert_eq!(store.mode(), CartMode::Authenticated);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_sync_continues_past_failed_lines() {
        let backend = FakeBackend::with_cart(Vec::new());
        backend.reject("chips");
        let store = guest_store(&backend);
        store.add_item(product("chips")).await;
        store.add_item(product("ladoo")).await;

        let report = store.login(&SecretString::from(TOKEN)).await.unwrap();

        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(store.items(), vec![line("ladoo", 1)]);
        assert_eq!(store.mode(), CartMode::Authenticated);
    }

    #[tokio::test]
    async fn test_sync_preconditions() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = guest_store(&backend);
        store.add_item(product("ladoo")).await;

        // No credential.
        assert!(!store.sync_cart_to_backend().await.performed);
        assert_eq!(backend.calls(), 0);

        // Authenticated mode.
        let store = signed_in_store(&backend).await;
        store.add_item(product("chips")).await;
        let calls = backend.calls();
        assert!(!store.sync_cart_to_backend().await.performed);
        assert_eq!(backend.calls(), calls);

        // Empty cart.
        let empty = guest_store(&backend);
        empty.auth().set_token(&SecretString::from(TOKEN)).unwrap();
        assert!(!empty.sync_cart_to_backend().await.performed);
    }

    #[tokio::test]
    async fn test_login_with_empty_cart_fetches_server_cart() {
        let backend = FakeBackend::with_cart(vec![line("chikki", 2)]);
        let store = guest_store(&backend);

        let report = store.login(&SecretString::from(TOKEN)).await.unwrap();

        assert!(!report.performed);
        assert_eq!(store.items(), vec![line("chikki", 2)]);
        assert_eq!(store.mode(), CartMode::Authenticated);
    }

    #[tokio::test]
    async fn test_logout_wipes_cart_and_credential() {
        let backend = FakeBackend::with_cart(vec![line("chips", 1)]);
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = open_on(&backend, Arc::clone(&storage));
        store.login(&SecretString::from(TOKEN)).await.unwrap();
        assert!(!store.items().is_empty());

        store.logout().unwrap();

        assert!(store.items().is_empty());
        assert!(!store.auth().is_authenticated());
        assert_eq!(store.mode(), CartMode::Authenticated);
        assert!(store.error().is_none());

        let snapshot = persisted(storage.as_ref());
        assert_eq!(snapshot["state"]["items"], serde_json::json!([]));
        assert_eq!(snapshot["state"]["isGuest"], Value::Bool(false));

        // Without a credential the next add is local again.
        store.add_item(product("ladoo")).await;
        assert_eq!(store.mode(), CartMode::Guest);
        assert_eq!(backend.server_items(), vec![line("chips", 1)]);
    }

    #[tokio::test]
    async fn test_cart_survives_reopen() {
        let backend = FakeBackend::with_cart(Vec::new());
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir.path()).unwrap());

        let store = open_on(&backend, Arc::clone(&storage));
        store.add_item(product("ladoo").with_quantity(2)).await;
        store.close().unwrap();

        let reopened = open_on(&backend, storage);
        assert_eq!(reopened.items(), vec![line("ladoo", 2)]);
        assert_eq!(reopened.mode(), CartMode::Guest);
        assert!(!reopened.is_loading());
    }

    // =========================================================================
    // Overlapping requests
    // =========================================================================

    #[tokio::test]
    async fn test_stale_server_snapshot_is_not_adopted() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = signed_in_store(&backend).await;

        let (release, gate) = oneshot::channel();
        backend.gate_next_fetch(gate);

        let slow_fetch = store.fetch_cart();
        let add_then_release = async {
            store.add_item(product("ladoo")).await;
            assert!(store.is_loading());
            release.send(()).unwrap();
        };
        tokio::join!(slow_fetch, add_then_release);

        assert_eq!(store.items(), vec![line("ladoo", 1)]);
        assert!(!store.is_loading());
        assert_eq!(store.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_wipe_discards_in_flight_fallback() {
        let backend = FakeBackend::with_cart(vec![line("chips", 1)]);
        let store = signed_in_store(&backend).await;
        backend.set_failing(true);

        let (release, gate) = oneshot::channel();
        backend.gate_next_fetch(gate);

        let slow_fetch = store.fetch_cart();
        let logout_then_release = async {
            store.logout().unwrap();
            release.send(()).unwrap();
        };
        tokio::join!(slow_fetch, logout_then_release);

        assert!(store.items().is_empty());
        assert_eq!(store.mode(), CartMode::Authenticated);
        assert!(store.error().is_none());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_stale_fetch_does_not_overwrite_local_fallback() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = signed_in_store(&backend).await;

        let (release, gate) = oneshot::channel();
        backend.gate_next_fetch(gate);

        // The gated fetch has already read the empty server cart.
        let slow_fetch = store.fetch_cart();
        let fail_add_then_release = async {
            backend.set_failing(true);
            store.add_item(product("ladoo")).await;
            assert_eq!(store.items(), vec![line("ladoo", 1)]);
            release.send(()).unwrap();
        };
        tokio::join!(slow_fetch, fail_add_then_release);

        assert_eq!(store.items(), vec![line("ladoo", 1)]);
        assert_eq!(store.mode(), CartMode::Guest);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_wiped_add_does_not_notify() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = signed_in_store(&backend).await;
        backend.set_failing(true);
        let mut notifications = store.subscribe();

        let (release, gate) = oneshot::channel();
        backend.gate_next_add(gate);

        let slow_add = store.add_item(product("ladoo"));
        let logout_then_release = async {
            store.logout().unwrap();
            release.send(()).unwrap();
        };
        tokio::join!(slow_add, logout_then_release);

        assert!(store.items().is_empty());
        assert!(notifications.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_degraded_add_still_notifies() {
        let backend = FakeBackend::with_cart(Vec::new());
        let store = signed_in_store(&backend).await;
        backend.set_failing(true);
        let mut notifications = store.subscribe();

        store.add_item(product("chips")).await;

        assert_eq!(store.items(), vec![line("chips", 1)]);
        assert_eq!(notifications.try_recv().unwrap().product_name, "Banana Chips");
    }
}

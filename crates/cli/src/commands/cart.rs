//! Cart inspection and editing commands.

use pantry_cart::{CartStore, CartView};
use pantry_core::{ItemId, ProductDescriptor};
use tracing::{info, warn};

use super::CliError;

/// Print the cart.
///
/// # Errors
///
/// Returns an error if JSON output was requested and serialization fails.
pub fn show(store: &CartStore, json: bool) -> Result<(), CliError> {
    let view = store.summary();
    if json {
        print_json(&view)?;
    } else {
        print_table(&view);
    }
    Ok(())
}

/// Add a product and report the notification it raised.
pub async fn add(store: &CartStore, product: ProductDescriptor) {
    let mut notifications = store.subscribe();
    store.add_item(product).await;

    if let Ok(notification) = notifications.try_recv() {
        info!("{}", notification.message);
    }
    report(store);
}

/// Remove a product.
pub async fn remove(store: &CartStore, id: &ItemId) {
    if !store.items().iter().any(|item| &item.id == id) {
        warn!(%id, "Product is not in the cart");
        return;
    }
    store.remove_item(id).await;
    report(store);
}

/// Set the quantity of a product.
pub async fn update(store: &CartStore, id: &ItemId, quantity: i64) {
    if quantity < 1 {
        warn!(quantity, "Quantity must be at least 1, cart unchanged");
        return;
    }
    store.update_quantity(id, quantity).await;
    report(store);
}

/// Empty the cart.
pub async fn clear(store: &CartStore) {
    store.clear_cart().await;
    report(store);
}

/// Load the server cart.
pub async fn fetch(store: &CartStore) {
    if !store.auth().is_authenticated() {
        info!("Not signed in, showing the local cart");
    }
    store.fetch_cart().await;
    report(store);
}

/// Log the outcome of a mutation and print the cart.
pub(super) fn report(store: &CartStore) {
    if let Some(error) = store.error() {
        warn!("Backend unavailable, change saved locally: {error}");
    }
    print_table(&store.summary());
}

#[allow(clippy::print_stdout)]
fn print_json(view: &CartView) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(view)?);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_table(view: &CartView) {
    if view.is_empty() {
        println!("Cart is empty ({:?})", view.mode);
        return;
    }

    for item in &view.items {
        println!(
            "{:>4} x {:<32} {:>12}  [{}]",
            item.quantity, item.name, item.line_price, item.id
        );
    }
    println!(
        "{} items, subtotal {} ({:?})",
        view.item_count, view.subtotal, view.mode
    );
}

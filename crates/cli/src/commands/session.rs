//! Sign-in, sign-out, and reconciliation commands.

use pantry_cart::{CartStore, SyncReport};
use secrecy::SecretString;
use tracing::info;

use super::CliError;
use super::cart::report;

/// Push the guest cart to the backend.
pub async fn sync(store: &CartStore) {
    let sync = store.sync_cart_to_backend().await;
    log_sync(sync);
    report(store);
}

/// Store `token` and reconcile the guest cart.
///
/// # Errors
///
/// Returns an error if the token cannot be stored.
pub async fn login(store: &CartStore, token: String) -> Result<(), CliError> {
    let token = SecretString::from(token);
    let sync = store.login(&token).await?;
    info!("Signed in");
    log_sync(sync);
    report(store);
    Ok(())
}

/// Forget the token and wipe the cart.
///
/// # Errors
///
/// Returns an error if the token cannot be removed. The cart is wiped either
/// way.
pub fn logout(store: &CartStore) -> Result<(), CliError> {
    store.logout()?;
    info!("Signed out, cart cleared");
    Ok(())
}

fn log_sync(sync: SyncReport) {
    if sync.performed {
        info!(
            synced = sync.synced,
            failed = sync.failed,
            "Guest cart pushed to backend"
        );
    } else {
        info!("Nothing to sync");
    }
}

//! Transient user-facing notifications.
//!
//! The store broadcasts a [`Notification`] whenever an item lands in the
//! cart. Subscribers render it and drop it once [`Notification::is_expired`]
//! reports true.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 32;

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ItemAdded,
}

/// A toast-style message that dismisses itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub product_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub dismiss_after: Duration,
}

impl Notification {
    /// Build an "added to cart" notification.
    #[must_use]
    pub fn item_added(product_name: &str, dismiss_after: Duration) -> Self {
        Self {
            kind: NotificationKind::ItemAdded,
            product_name: product_name.to_owned(),
            message: format!("{product_name} added to cart!"),
            created_at: Utc::now(),
            dismiss_after,
        }
    }

    /// Whether the notification should no longer be shown at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.dismiss_after)
            .map_or(true, |ttl| now >= self.created_at + ttl)
    }
}

/// Broadcast sender for notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
    dismiss_after: Duration,
}

impl Notifier {
    #[must_use]
    pub fn new(dismiss_after: Duration) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            dismiss_after,
        }
    }

    /// Subscribe to future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Emit an "added to cart" notification.
    ///
    /// Having no subscribers is fine; the message is simply dropped.
    pub fn item_added(&self, product_name: &str) -> Notification {
        let notification = Notification::item_added(product_name, self.dismiss_after);
        let _ = self.sender.send(notification.clone());
        notification
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

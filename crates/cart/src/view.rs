//! Display-ready view of the cart.

use pantry_core::{CartItem, CurrencyCode, format_amount, item_count, total};
use serde::Serialize;

use crate::state::{CartMode, CartSession, SyncPhase};

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
}

/// Cart display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
    pub mode: CartMode,
    pub phase: SyncPhase,
    pub loading: bool,
    pub error: Option<String>,
}

impl CartView {
    /// Build a view of `session` priced in `currency`.
    #[must_use]
    pub fn from_session(session: &CartSession, currency: CurrencyCode) -> Self {
        Self {
            items: session
                .items
                .iter()
                .map(|item| CartItemView::new(item, currency))
                .collect(),
            subtotal: format_amount(total(&session.items), currency),
            item_count: item_count(&session.items),
            mode: session.mode,
            phase: session.phase,
            loading: session.loading,
            error: session.error.clone(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CartItemView {
    fn new(item: &CartItem, currency: CurrencyCode) -> Self {
        Self {
            id: item.id.to_string(),
            name: item.name.clone(),
            category: item.category.clone(),
            quantity: item.quantity,
            price: format_amount(item.price, currency),
            line_price: format_amount(item.line_total(), currency),
            image: item.image.clone(),
        }
    }
}

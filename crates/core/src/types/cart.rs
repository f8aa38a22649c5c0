//! Cart line items and the product descriptors they are built from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ItemId;
use super::price;

/// A single line in a cart.
///
/// `quantity` is always at least 1; a line whose quantity would drop to
/// zero is removed from the cart instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ItemId,
    pub name: String,
    #[serde(deserialize_with = "price::deserialize_lenient")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    /// `price * quantity` for this line, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Product data supplied when adding to the cart.
///
/// Accepts the server's `_id` as an alias for `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    #[serde(alias = "_id")]
    pub id: ItemId,
    pub name: String,
    #[serde(deserialize_with = "price::deserialize_lenient")]
    pub price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Requested quantity; `None` or `0` means one unit.
    #[serde(default)]
    pub quantity: Option<u32>,
}

impl ProductDescriptor {
    /// Create a descriptor for one unit of a product.
    #[must_use]
    pub fn new(id: ItemId, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            price: price.max(Decimal::ZERO),
            image: None,
            category: None,
            quantity: None,
        }
    }

    /// Set the image URI.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set an explicit quantity.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// The quantity to add, defaulting to one.
    #[must_use]
    pub fn requested_quantity(&self) -> u32 {
        self.quantity.filter(|q| *q >= 1).unwrap_or(1)
    }

    /// Build a cart line for this product with the given quantity.
    #[must_use]
    pub fn to_item(&self, quantity: u32) -> CartItem {
        CartItem {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price.max(Decimal::ZERO),
            image: self.image.clone(),
            category: self.category.clone(),
            quantity: quantity.max(1),
        }
    }
}

/// Sum of `price * quantity` over all lines, saturating at `Decimal::MAX`.
#[must_use]
pub fn total(items: &[CartItem]) -> Decimal {
    items
        .iter()
        .map(CartItem::line_total)
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Sum of quantities over all lines.
#[must_use]
pub fn item_count(items: &[CartItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity)).sum()
}

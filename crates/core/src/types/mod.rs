//! Core types for Pantry.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod price;

pub use cart::{CartItem, ProductDescriptor, item_count, total};
pub use id::{ItemId, ItemIdError};
pub use price::{CurrencyCode, UnknownCurrency, format_amount};

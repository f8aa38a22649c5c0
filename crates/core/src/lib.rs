//! Pantry Core - Shared cart domain types.
//!
//! This crate provides the types shared by every Pantry component:
//! - `cart` - The persisted cart session store and its backend client
//! - `cli` - Command-line host for the cart store
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no storage,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Item identities, cart line items, product descriptors and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

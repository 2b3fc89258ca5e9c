//! Covey Core - Shared types library.
//!
//! This crate provides common types used across the Covey farm shop:
//! - `shop` - Storefront, checkout and fulfillment engine
//!
//! # Architecture
//!
//! The core crate contains only types and small pure helpers - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money rounding, and order status

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

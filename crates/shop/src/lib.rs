//! Covey farm shop library.
//!
//! Order fulfillment consistency engine for a small shop: carts, catalog
//! with atomic stock reservation, checkout orchestration against a hosted
//! payment gateway, and idempotent payment-webhook fulfillment with
//! compensation.
//!
//! The crate is a library so the HTTP surface and every service underneath
//! it can be exercised in tests without a running server.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod notify;
pub mod payments;
pub mod pricing;
pub mod routes;
pub mod session;
pub mod state;
pub mod stores;
pub mod webhook;

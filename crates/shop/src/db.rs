//! Database connection handling for the shop's `PostgreSQL`.
//!
//! # Tables
//!
//! - `kit` - Catalog entries with live stock counters
//! - `cart` - One open cart per owner (user or anonymous token)
//! - `cart_line` - Cart contents, keyed by cart-local line ID
//! - `shop_order` - Finalized orders, unique per payment session
//! - `shop_order_item` - Immutable order line snapshots
//! - `sessions` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations live in `crates/shop/migrations/` and run automatically at
//! startup via `sqlx::migrate!`.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

//! Catalog items ("kits").

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use covey_core::KitId;

/// A purchasable kit: the unit of catalog and stock accounting.
///
/// `quantity` is the available stock and is never negative; the only code
/// path that decrements it is the atomic reservation in the catalog store.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Kit {
    pub id: KitId,
    pub name: String,
    /// Current authoritative unit price.
    pub price: Decimal,
    /// Available stock.
    pub quantity: i32,
    pub active: bool,
}

/// Payload for creating a kit (admin CRUD).
#[derive(Debug, Clone, Deserialize)]
pub struct NewKit {
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Partial update for a kit (admin CRUD).
///
/// `quantity` here is an administrative restock/correction, not a
/// reservation; concurrent fulfillment still goes through `reserve`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KitUpdate {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub active: Option<bool>,
}

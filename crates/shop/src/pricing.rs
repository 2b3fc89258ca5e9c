//! Checkout-time price validation.
//!
//! Recomputes authoritative prices directly from the catalog; the cart's
//! stored price snapshots are display-only and never trusted for money. The
//! stock check here is advisory (fast feedback before a payment session is
//! opened); the authoritative enforcement is the atomic reservation in the
//! webhook handler.

use rust_decimal::Decimal;
use thiserror::Error;

use covey_core::round2;

use crate::models::{Cart, DraftLine, OrderDraft, ShippingAddress};
use crate::stores::{CatalogStore, StoreError};

/// Orders at or above this subtotal ship free.
#[must_use]
pub fn free_shipping_threshold() -> Decimal {
    Decimal::new(15000, 2) // 150.00
}

/// Flat shipping fee below the free-shipping threshold.
#[must_use]
pub fn standard_shipping_fee() -> Decimal {
    Decimal::new(1250, 2) // 12.50
}

/// Errors from checkout-time validation.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Nothing to check out.
    #[error("cart is empty")]
    EmptyCart,

    /// One or more lines reference a kit that is missing, inactive, or
    /// stock-short at validation time.
    #[error("inventory conflict: {0}")]
    InventoryConflict(String),

    /// Catalog lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validate a cart against the current catalog and produce a frozen draft.
///
/// Each line re-reads the kit's current price, active flag and stock. The
/// returned [`OrderDraft`] is the single source of truth carried into the
/// payment session; the webhook handler never re-derives it from the cart.
///
/// # Errors
///
/// Returns [`PricingError::EmptyCart`] for a cart without lines and
/// [`PricingError::InventoryConflict`] naming every offending line.
pub async fn validate(
    cart: &Cart,
    catalog: &dyn CatalogStore,
    shipping_address: ShippingAddress,
) -> Result<OrderDraft, PricingError> {
    if cart.lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let mut lines = Vec::with_capacity(cart.lines.len());
    let mut conflicts = Vec::new();
    let mut subtotal = Decimal::ZERO;

    for line in &cart.lines {
        let Some(kit) = catalog.get(line.kit_id).await? else {
            conflicts.push(format!("kit {} no longer exists", line.kit_id));
            continue;
        };
        if !kit.active {
            conflicts.push(format!("{} is no longer available", kit.name));
            continue;
        }
        if kit.quantity < line.quantity {
            conflicts.push(format!(
                "{}: requested {}, only {} in stock",
                kit.name, line.quantity, kit.quantity
            ));
            continue;
        }

        subtotal += kit.price * Decimal::from(line.quantity);
        lines.push(DraftLine {
            kit_id: kit.id,
            name: kit.name,
            unit_price: kit.price,
            quantity: line.quantity,
        });
    }

    if !conflicts.is_empty() {
        return Err(PricingError::InventoryConflict(conflicts.join("; ")));
    }

    let subtotal = round2(subtotal);
    let shipping_cost = if subtotal >= free_shipping_threshold() {
        Decimal::ZERO
    } else {
        standard_shipping_fee()
    };
    let total = round2(subtotal + shipping_cost);

    Ok(OrderDraft {
        cart_id: cart.id,
        owner: cart.owner.user_id(),
        lines,
        subtotal,
        shipping_cost,
        total,
        shipping_address,
    })
}

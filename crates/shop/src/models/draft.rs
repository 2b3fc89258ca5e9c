//! Validated order drafts.
//!
//! A draft is produced by checkout-time validation and carried, serialized,
//! inside the payment session's metadata. The webhook handler reconstructs
//! the order exclusively from the draft; it never re-reads the cart, which
//! may have changed or been deleted in the meantime.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use covey_core::{CartId, KitId, UserId};

use super::order::{NewOrder, OrderItem, ShippingAddress};

/// Metadata key under which the serialized draft travels through the
/// payment session.
pub const DRAFT_METADATA_KEY: &str = "order_draft";

/// One validated, frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub kit_id: KitId,
    pub name: String,
    /// Authoritative unit price read from the catalog at validation time.
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// A server-validated order draft: the single source of truth carried into
/// the external payment session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    /// The cart this draft was priced from; deleted on fulfillment.
    pub cart_id: CartId,
    /// `None` for guest checkout.
    pub owner: Option<UserId>,
    pub lines: Vec<DraftLine>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
}

impl OrderDraft {
    /// Convert the draft into an order insert for the given payment session.
    #[must_use]
    pub fn into_new_order(
        self,
        external_session_id: String,
        external_payment_id: Option<String>,
    ) -> NewOrder {
        NewOrder {
            owner: self.owner,
            items: self
                .lines
                .into_iter()
                .map(|l| OrderItem {
                    kit_id: l.kit_id,
                    name: l.name,
                    unit_price: l.unit_price,
                    quantity: l.quantity,
                })
                .collect(),
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            total: self.total,
            external_session_id,
            external_payment_id,
            shipping_address: self.shipping_address,
        }
    }
}

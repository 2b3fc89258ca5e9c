//! Finalized orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use covey_core::{KitId, OrderId, OrderStatus, UserId};

/// A frozen order line: the kit's name and unit price at fulfillment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub kit_id: KitId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Shipping destination captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// A finalized order.
///
/// Created exactly once per checkout session by the payment webhook handler;
/// `external_session_id` is unique and serves as the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// `None` for guest checkout.
    pub owner: Option<UserId>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub external_session_id: String,
    pub external_payment_id: Option<String>,
    pub shipping_address: ShippingAddress,
    pub tracking_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload for inserting an order. The store assigns the ID and timestamp.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner: Option<UserId>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub external_session_id: String,
    pub external_payment_id: Option<String>,
    pub shipping_address: ShippingAddress,
}

/// Admin order listing filter.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub owner: Option<UserId>,
}

//! Storage traits for catalog, carts, and orders.
//!
//! Handlers depend on these traits, never on a concrete backend. Two
//! implementations exist: [`postgres`] for production and [`memory`] for
//! tests and local development. Both uphold the same contracts:
//!
//! - `CatalogStore::reserve` is a single indivisible check-and-decrement;
//!   stock can never go negative.
//! - `OrderStore::create` and `OrderStore::record_refund` both claim the
//!   payment session's idempotency key and report an already-claimed key as
//!   [`StoreError::DuplicateSession`]; that single keyspace is the final
//!   arbiter against double fulfillment and against refunding a session
//!   that was fulfilled concurrently.

use async_trait::async_trait;
use thiserror::Error;

use covey_core::{CartId, KitId, OrderId, OrderStatus, UserId};

use crate::models::{Cart, CartOwner, Kit, KitUpdate, NewKit, NewOrder, Order, OrderFilter};

pub mod memory;
pub mod postgres;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("not found")]
    NotFound,

    /// Conditional stock decrement failed: not enough stock.
    #[error("insufficient stock for kit {kit_id}")]
    InsufficientStock { kit_id: KitId },

    /// An order already exists for this payment session.
    #[error("order already exists for payment session {0}")]
    DuplicateSession(String),

    /// Administrative status change not permitted from the current status.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be decoded.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Catalog of purchasable kits, including the atomic stock reservation
/// every fulfillment attempt goes through.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Create a kit.
    async fn create(&self, kit: NewKit) -> Result<Kit, StoreError>;

    /// Fetch a kit by ID.
    async fn get(&self, id: KitId) -> Result<Option<Kit>, StoreError>;

    /// List kits; active ones only unless `include_inactive`.
    async fn list(&self, include_inactive: bool) -> Result<Vec<Kit>, StoreError>;

    /// Apply a partial update. Returns the updated kit.
    async fn update(&self, id: KitId, update: KitUpdate) -> Result<Kit, StoreError>;

    /// Delete a kit.
    async fn delete(&self, id: KitId) -> Result<(), StoreError>;

    /// Atomically decrement stock by `quantity` if enough is available.
    ///
    /// This is the only operation allowed to lower `Kit::quantity`. It must
    /// be one indivisible check-and-decrement at the storage boundary, never
    /// a read followed by a write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InsufficientStock`] without side effect when
    /// the current stock is below `quantity`, [`StoreError::NotFound`] for
    /// an unknown kit.
    async fn reserve(&self, id: KitId, quantity: i32) -> Result<(), StoreError>;

    /// Restore previously reserved stock (compensation path).
    async fn release(&self, id: KitId, quantity: i32) -> Result<(), StoreError>;
}

/// Cart persistence. Mutation semantics (TTL refresh, merge) live on the
/// [`Cart`] model; stores load and save whole carts.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Find the owner's cart. Expired carts are treated as absent.
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError>;

    /// Create an empty cart for `owner`.
    async fn create(&self, owner: CartOwner) -> Result<Cart, StoreError>;

    /// Persist the cart's current lines and expiry.
    async fn save(&self, cart: &Cart) -> Result<(), StoreError>;

    /// Delete a cart (successful fulfillment, or after merge).
    async fn delete(&self, id: CartId) -> Result<(), StoreError>;
}

/// Finalized order persistence, plus the per-session resolution record that
/// arbitrates between order creation and post-payment refunds.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order, claiming its payment session as fulfilled.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateSession`] when the session is already
    /// resolved, by an existing order or by a recorded refund; the storage
    /// layer enforces this with a uniqueness constraint, not a prior read.
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Record that a payment session was resolved by a refund instead of an
    /// order, claiming its idempotency key. The row is the durable incident
    /// record; the caller only issues the refund once this succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateSession`] when the session is already
    /// resolved (an order exists, or a refund is already recorded).
    async fn record_refund(&self, session_id: &str, reason: &str) -> Result<(), StoreError>;

    /// Fetch an order by ID.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Fetch the order created for a payment session, if any.
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, StoreError>;

    /// Orders belonging to `owner`, newest first.
    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Order>, StoreError>;

    /// All orders matching `filter`, newest first (admin).
    async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, StoreError>;

    /// Administrative status transition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTransition`] unless the change is
    /// `PAID -> SHIPPED` or `{PAID, SHIPPED} -> CANCELLED`.
    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError>;

    /// Assign a tracking code. Implies a transition to `SHIPPED`.
    async fn set_tracking(&self, id: OrderId, code: &str) -> Result<Order, StoreError>;
}

//! Domain models for the shop engine.

pub mod cart;
pub mod draft;
pub mod kit;
pub mod order;

pub use cart::{Cart, CartLine, CartOwner};
pub use draft::{DraftLine, OrderDraft};
pub use kit::{Kit, KitUpdate, NewKit};
pub use order::{NewOrder, Order, OrderFilter, OrderItem, ShippingAddress};

/// Session keys for identity data.
///
/// The keys are written by the (out-of-scope) authentication system and by
/// the anonymous-identity resolver; everything downstream only reads them.
pub mod session_keys {
    /// Key for the logged-in user's ID.
    pub const USER_ID: &str = "user_id";

    /// Key for the anonymous cart token issued to guests.
    pub const ANON_TOKEN: &str = "anon_token";

    /// Key for the admin flag set by the admin authentication system.
    pub const IS_ADMIN: &str = "is_admin";
}

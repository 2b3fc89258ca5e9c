//! Carts and cart ownership.
//!
//! A cart belongs to exactly one owner: an authenticated user or an anonymous
//! session token. All mutation helpers live on the model so the Postgres and
//! in-memory stores share identical semantics; stores only load and save.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use covey_core::{CartId, CartLineId, KitId, UserId};

/// Cart TTL for anonymous owners (7 days).
const ANON_TTL_DAYS: i64 = 7;

/// Cart TTL for authenticated owners (30 days).
const USER_TTL_DAYS: i64 = 30;

/// The identity a cart belongs to.
///
/// Guests get a server-generated opaque token persisted in their session;
/// authenticated callers are keyed by user ID. Downstream cart logic is
/// identity-agnostic and only sees this enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CartOwner {
    User(UserId),
    Anonymous(String),
}

impl CartOwner {
    /// TTL applied to carts of this owner on every mutation.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        match self {
            Self::User(_) => Duration::days(USER_TTL_DAYS),
            Self::Anonymous(_) => Duration::days(ANON_TTL_DAYS),
        }
    }

    /// The user ID, if this owner is authenticated.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }
}

/// One intended purchase line in a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub kit_id: KitId,
    pub quantity: i32,
    /// Unit price at the time the line was added. Display only; checkout
    /// re-reads the authoritative price from the catalog.
    pub price_snapshot: Decimal,
}

/// A buyer's pre-checkout accumulation of intended purchases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
    pub lines: Vec<CartLine>,
    pub expires_at: DateTime<Utc>,
    /// Next line ID to hand out. Monotonic for the cart's lifetime so a
    /// removed line's ID is never reassigned to a later addition.
    pub next_line_id: i64,
}

impl Cart {
    /// Create an empty cart for `owner` with a fresh TTL.
    #[must_use]
    pub fn new(id: CartId, owner: CartOwner, now: DateTime<Utc>) -> Self {
        let expires_at = now + owner.ttl();
        Self {
            id,
            owner,
            lines: Vec::new(),
            expires_at,
            next_line_id: 1,
        }
    }

    /// Whether the cart has passed its TTL and should be treated as absent.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Refresh the TTL. Called by every mutation.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.expires_at = now + self.owner.ttl();
    }

    /// Add a line, merging quantities when the kit is already in the cart.
    pub fn add_line(
        &mut self,
        kit_id: KitId,
        quantity: i32,
        price_snapshot: Decimal,
        now: DateTime<Utc>,
    ) -> CartLineId {
        self.touch(now);
        if let Some(line) = self.lines.iter_mut().find(|l| l.kit_id == kit_id) {
            line.quantity += quantity;
            line.price_snapshot = price_snapshot;
            return line.id;
        }
        let id = self.allocate_line_id();
        self.lines.push(CartLine {
            id,
            kit_id,
            quantity,
            price_snapshot,
        });
        id
    }

    /// Set the quantity of an existing line. Returns `false` if the line is
    /// not in this cart.
    pub fn update_line(&mut self, line_id: CartLineId, quantity: i32, now: DateTime<Utc>) -> bool {
        let Some(line) = self.lines.iter_mut().find(|l| l.id == line_id) else {
            return false;
        };
        line.quantity = quantity;
        self.touch(now);
        true
    }

    /// Remove a line. Returns `false` if the line is not in this cart.
    pub fn remove_line(&mut self, line_id: CartLineId, now: DateTime<Utc>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        if self.lines.len() == before {
            return false;
        }
        self.touch(now);
        true
    }

    /// Remove all lines.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.touch(now);
    }

    /// Merge a guest cart into this (user) cart.
    ///
    /// Lines for kits already present have their quantities summed; other
    /// lines are appended. The caller deletes the guest cart afterwards.
    pub fn merge_from(&mut self, guest: &Self, now: DateTime<Utc>) {
        for line in &guest.lines {
            self.add_line(line.kit_id, line.quantity, line.price_snapshot, now);
        }
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| i64::from(l.quantity)).sum()
    }

    fn allocate_line_id(&mut self) -> CartLineId {
        let id = CartLineId::new(self.next_line_id);
        self.next_line_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn user_cart() -> Cart {
        Cart::new(CartId::new(1), CartOwner::User(UserId::new(10)), Utc::now())
    }

    #[test]
    fn test_add_line_merges_same_kit() {
        let now = Utc::now();
        let mut cart = user_cart();
        let first = cart.add_line(KitId::new(1), 2, dec(1000), now);
        let second = cart.add_line(KitId::new(1), 3, dec(1100), now);
        assert_eq!(first, second);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
        // Snapshot follows the latest add; it is display-only anyway.
        assert_eq!(cart.lines[0].price_snapshot, dec(1100));
    }

    #[test]
    fn test_merge_sums_shared_and_appends_rest() {
        let now = Utc::now();
        let mut user = user_cart();
        user.add_line(KitId::new(1), 1, dec(500), now);
        user.add_line(KitId::new(2), 3, dec(700), now);

        let mut guest = Cart::new(
            CartId::new(2),
            CartOwner::Anonymous("tok".to_owned()),
            now,
        );
        guest.add_line(KitId::new(1), 2, dec(500), now);

        user.merge_from(&guest, now);

        let qty = |kit: i64| {
            user.lines
                .iter()
                .find(|l| l.kit_id == KitId::new(kit))
                .map(|l| l.quantity)
        };
        assert_eq!(qty(1), Some(3));
        assert_eq!(qty(2), Some(3));
        assert_eq!(user.lines.len(), 2);
    }

    #[test]
    fn test_mutations_refresh_ttl() {
        let now = Utc::now();
        let mut cart = user_cart();
        cart.expires_at = now - Duration::days(1);
        assert!(cart.is_expired(now));
        cart.add_line(KitId::new(1), 1, dec(100), now);
        assert!(!cart.is_expired(now));
        assert_eq!(cart.expires_at, now + Duration::days(30));
    }

    #[test]
    fn test_anonymous_ttl_is_shorter() {
        let now = Utc::now();
        let cart = Cart::new(CartId::new(3), CartOwner::Anonymous("t".to_owned()), now);
        assert_eq!(cart.expires_at, now + Duration::days(7));
    }

    #[test]
    fn test_update_and_remove_unknown_line() {
        let now = Utc::now();
        let mut cart = user_cart();
        assert!(!cart.update_line(CartLineId::new(99), 1, now));
        assert!(!cart.remove_line(CartLineId::new(99), now));
    }

    #[test]
    fn test_line_ids_are_not_reused_within_snapshot() {
        let now = Utc::now();
        let mut cart = user_cart();
        let a = cart.add_line(KitId::new(1), 1, dec(100), now);
        let b = cart.add_line(KitId::new(2), 1, dec(100), now);
        assert_ne!(a, b);
        assert!(cart.remove_line(a, now));
        let c = cart.add_line(KitId::new(3), 1, dec(100), now);
        assert_ne!(b, c);
    }

    #[test]
    fn test_line_id_not_reused_after_removing_newest_line() {
        let now = Utc::now();
        let mut cart = user_cart();
        let a = cart.add_line(KitId::new(1), 1, dec(100), now);
        let b = cart.add_line(KitId::new(2), 1, dec(100), now);
        assert!(cart.remove_line(b, now));

        // A client holding the removed ID must not silently target this line.
        let c = cart.add_line(KitId::new(3), 1, dec(100), now);
        assert_ne!(c, b);
        assert_ne!(c, a);
        assert!(!cart.update_line(b, 9, now));
    }
}

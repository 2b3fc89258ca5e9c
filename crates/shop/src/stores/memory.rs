//! In-memory store implementations.
//!
//! Used by the test suite and by local development without Postgres. The
//! catalog keeps reservation atomic by doing the check-and-decrement under
//! one mutex guard, mirroring the conditional `UPDATE` the Postgres store
//! issues.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use covey_core::{CartId, KitId, OrderId, OrderStatus, UserId};

use crate::models::{Cart, CartOwner, Kit, KitUpdate, NewKit, NewOrder, Order, OrderFilter};

use super::{CartStore, CatalogStore, OrderStore, StoreError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`CatalogStore`].
#[derive(Default)]
pub struct MemoryCatalog {
    kits: Mutex<HashMap<KitId, Kit>>,
    next_id: AtomicI64,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn create(&self, kit: NewKit) -> Result<Kit, StoreError> {
        let id = KitId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let kit = Kit {
            id,
            name: kit.name,
            price: kit.price,
            quantity: kit.quantity,
            active: kit.active,
        };
        lock(&self.kits).insert(id, kit.clone());
        Ok(kit)
    }

    async fn get(&self, id: KitId) -> Result<Option<Kit>, StoreError> {
        Ok(lock(&self.kits).get(&id).cloned())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Kit>, StoreError> {
        let mut kits: Vec<Kit> = lock(&self.kits)
            .values()
            .filter(|k| include_inactive || k.active)
            .cloned()
            .collect();
        kits.sort_by_key(|k| k.id);
        Ok(kits)
    }

    async fn update(&self, id: KitId, update: KitUpdate) -> Result<Kit, StoreError> {
        let mut kits = lock(&self.kits);
        let kit = kits.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = update.name {
            kit.name = name;
        }
        if let Some(price) = update.price {
            kit.price = price;
        }
        if let Some(quantity) = update.quantity {
            kit.quantity = quantity;
        }
        if let Some(active) = update.active {
            kit.active = active;
        }
        Ok(kit.clone())
    }

    async fn delete(&self, id: KitId) -> Result<(), StoreError> {
        lock(&self.kits)
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn reserve(&self, id: KitId, quantity: i32) -> Result<(), StoreError> {
        let mut kits = lock(&self.kits);
        let kit = kits.get_mut(&id).ok_or(StoreError::NotFound)?;
        if kit.quantity < quantity {
            return Err(StoreError::InsufficientStock { kit_id: id });
        }
        kit.quantity -= quantity;
        Ok(())
    }

    async fn release(&self, id: KitId, quantity: i32) -> Result<(), StoreError> {
        let mut kits = lock(&self.kits);
        let kit = kits.get_mut(&id).ok_or(StoreError::NotFound)?;
        kit.quantity += quantity;
        Ok(())
    }
}

/// In-memory [`CartStore`].
#[derive(Default)]
pub struct MemoryCarts {
    carts: Mutex<HashMap<CartId, Cart>>,
    next_id: AtomicI64,
}

impl MemoryCarts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCarts {
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        let now = Utc::now();
        let mut carts = lock(&self.carts);
        // Lazy TTL purge: drop the owner's cart if it has expired.
        let expired: Vec<CartId> = carts
            .values()
            .filter(|c| c.is_expired(now))
            .map(|c| c.id)
            .collect();
        for id in expired {
            carts.remove(&id);
        }
        Ok(carts.values().find(|c| &c.owner == owner).cloned())
    }

    async fn create(&self, owner: CartOwner) -> Result<Cart, StoreError> {
        let id = CartId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let cart = Cart::new(id, owner, Utc::now());
        lock(&self.carts).insert(id, cart.clone());
        Ok(cart)
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut carts = lock(&self.carts);
        if !carts.contains_key(&cart.id) {
            return Err(StoreError::NotFound);
        }
        carts.insert(cart.id, cart.clone());
        Ok(())
    }

    async fn delete(&self, id: CartId) -> Result<(), StoreError> {
        lock(&self.carts).remove(&id);
        Ok(())
    }
}

/// Orders and refund claims live behind one guard so that claiming a
/// session and checking for an existing resolution are a single step.
#[derive(Default)]
struct OrdersInner {
    orders: Vec<Order>,
    refunded_sessions: HashMap<String, String>,
}

impl OrdersInner {
    fn session_resolved(&self, session_id: &str) -> bool {
        self.refunded_sessions.contains_key(session_id)
            || self
                .orders
                .iter()
                .any(|o| o.external_session_id == session_id)
    }
}

/// In-memory [`OrderStore`].
#[derive(Default)]
pub struct MemoryOrders {
    inner: Mutex<OrdersInner>,
    next_id: AtomicI64,
}

impl MemoryOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded refund reason for a session, if one exists.
    #[must_use]
    pub fn refund_reason(&self, session_id: &str) -> Option<String> {
        lock(&self.inner).refunded_sessions.get(session_id).cloned()
    }

    fn transition(
        orders: &mut [Order],
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound)?;
        if !order.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }
        order.status = next;
        Ok(order.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryOrders {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut inner = lock(&self.inner);
        // The session ID is the idempotency key; a resolved session (prior
        // order or recorded refund) must fail harmlessly under the same
        // guard that performs the insert.
        if inner.session_resolved(&order.external_session_id) {
            return Err(StoreError::DuplicateSession(order.external_session_id));
        }
        let id = OrderId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let order = Order {
            id,
            owner: order.owner,
            items: order.items,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
            status: OrderStatus::Paid,
            external_session_id: order.external_session_id,
            external_payment_id: order.external_payment_id,
            shipping_address: order.shipping_address,
            tracking_code: None,
            created_at: Utc::now(),
        };
        inner.orders.push(order.clone());
        Ok(order)
    }

    async fn record_refund(&self, session_id: &str, reason: &str) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        if inner.session_resolved(session_id) {
            return Err(StoreError::DuplicateSession(session_id.to_owned()));
        }
        inner
            .refunded_sessions
            .insert(session_id.to_owned(), reason.to_owned());
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(lock(&self.inner).orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, StoreError> {
        Ok(lock(&self.inner)
            .orders
            .iter()
            .find(|o| o.external_session_id == session_id)
            .cloned())
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = lock(&self.inner)
            .orders
            .iter()
            .filter(|o| o.owner == Some(owner))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(orders)
    }

    async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = lock(&self.inner)
            .orders
            .iter()
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.owner.is_none_or(|u| o.owner == Some(u)))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(orders)
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError> {
        Self::transition(&mut lock(&self.inner).orders, id, status)
    }

    async fn set_tracking(&self, id: OrderId, code: &str) -> Result<Order, StoreError> {
        let mut inner = lock(&self.inner);
        // Tracking assignment implies SHIPPED, unless already shipped.
        let current = inner
            .orders
            .iter()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound)?
            .status;
        if current == OrderStatus::Paid {
            Self::transition(&mut inner.orders, id, OrderStatus::Shipped)?;
        } else if current != OrderStatus::Shipped {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: OrderStatus::Shipped,
            });
        }
        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound)?;
        order.tracking_code = Some(code.to_owned());
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use crate::models::ShippingAddress;

    use super::*;

    fn new_kit(quantity: i32) -> NewKit {
        NewKit {
            name: "Starter kit".to_owned(),
            price: Decimal::new(4999, 2),
            quantity,
            active: true,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient: "Jo Doe".to_owned(),
            street: "1 Farm Rd".to_owned(),
            city: "Plainfield".to_owned(),
            postal_code: "12345".to_owned(),
            country: "US".to_owned(),
        }
    }

    fn new_order(session: &str) -> NewOrder {
        NewOrder {
            owner: None,
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            shipping_cost: Decimal::ZERO,
            total: Decimal::ZERO,
            external_session_id: session.to_owned(),
            external_payment_id: Some("pay_1".to_owned()),
            shipping_address: address(),
        }
    }

    #[tokio::test]
    async fn test_reserve_decrements_and_rejects_shortfall() {
        let catalog = MemoryCatalog::new();
        let kit = catalog.create(new_kit(3)).await.expect("create");

        catalog.reserve(kit.id, 2).await.expect("reserve 2");
        let err = catalog.reserve(kit.id, 2).await.expect_err("only 1 left");
        assert!(matches!(err, StoreError::InsufficientStock { .. }));

        // The failed reservation had no side effect.
        let kit = catalog.get(kit.id).await.expect("get").expect("some");
        assert_eq!(kit.quantity, 1);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversell() {
        let catalog = Arc::new(MemoryCatalog::new());
        let kit = catalog.create(new_kit(10)).await.expect("create");

        let mut handles = Vec::new();
        for _ in 0..50 {
            let catalog = Arc::clone(&catalog);
            handles.push(tokio::spawn(
                async move { catalog.reserve(kit.id, 1).await },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.expect("join").is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 10);
        let kit = catalog.get(kit.id).await.expect("get").expect("some");
        assert_eq!(kit.quantity, 0);
    }

    #[tokio::test]
    async fn test_release_restores_stock() {
        let catalog = MemoryCatalog::new();
        let kit = catalog.create(new_kit(5)).await.expect("create");
        catalog.reserve(kit.id, 5).await.expect("reserve");
        catalog.release(kit.id, 5).await.expect("release");
        let kit = catalog.get(kit.id).await.expect("get").expect("some");
        assert_eq!(kit.quantity, 5);
    }

    #[tokio::test]
    async fn test_duplicate_session_rejected() {
        let orders = MemoryOrders::new();
        orders.create(new_order("cs_1")).await.expect("first");
        let err = orders.create(new_order("cs_1")).await.expect_err("dup");
        assert!(matches!(err, StoreError::DuplicateSession(_)));
    }

    #[tokio::test]
    async fn test_refund_not_recordable_for_fulfilled_session() {
        let orders = MemoryOrders::new();
        orders.create(new_order("cs_done")).await.expect("create");
        let err = orders
            .record_refund("cs_done", "oversold")
            .await
            .expect_err("session already fulfilled");
        assert!(matches!(err, StoreError::DuplicateSession(_)));
        assert!(orders.refund_reason("cs_done").is_none());
    }

    #[tokio::test]
    async fn test_order_not_creatable_for_refunded_session() {
        let orders = MemoryOrders::new();
        orders
            .record_refund("cs_back", "oversold")
            .await
            .expect("record");
        assert_eq!(orders.refund_reason("cs_back").as_deref(), Some("oversold"));
        let err = orders.create(new_order("cs_back")).await.expect_err("refunded");
        assert!(matches!(err, StoreError::DuplicateSession(_)));
    }

    #[tokio::test]
    async fn test_expired_cart_treated_as_absent() {
        let carts = MemoryCarts::new();
        let owner = CartOwner::Anonymous("tok".to_owned());
        let mut cart = carts.create(owner.clone()).await.expect("create");
        cart.expires_at = Utc::now() - chrono::Duration::minutes(1);
        carts.save(&cart).await.expect("save");

        assert!(
            carts
                .find_by_owner(&owner)
                .await
                .expect("find")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_tracking_implies_shipped() {
        let orders = MemoryOrders::new();
        let order = orders.create(new_order("cs_2")).await.expect("create");
        let updated = orders.set_tracking(order.id, "TRACK-1").await.expect("set");
        assert_eq!(updated.status, OrderStatus::Shipped);
        assert_eq!(updated.tracking_code.as_deref(), Some("TRACK-1"));
    }

    #[tokio::test]
    async fn test_tracking_rejected_for_cancelled() {
        let orders = MemoryOrders::new();
        let order = orders.create(new_order("cs_3")).await.expect("create");
        orders
            .set_status(order.id, OrderStatus::Cancelled)
            .await
            .expect("cancel");
        let err = orders
            .set_tracking(order.id, "TRACK-2")
            .await
            .expect_err("cancelled orders cannot ship");
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }
}

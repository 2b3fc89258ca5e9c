//! Postgres store implementations.
//!
//! All queries use the runtime query API against the schema in
//! `crates/shop/migrations/`. Two contracts are enforced here rather than in
//! application code:
//!
//! - stock reservation is one conditional `UPDATE` guarded by
//!   `quantity >= $n`, so competing fulfillment attempts serialize on the row
//!   and stock can never go negative;
//! - every fulfillment outcome claims its payment session in
//!   `payment_session` (order creation inserts FULFILLED inside the order
//!   transaction, refund recording inserts REFUNDED), so concurrent webhook
//!   deliveries of one session arbitrate on a single primary key and a
//!   session can never be both fulfilled and refunded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use covey_core::{CartId, CartLineId, KitId, OrderId, OrderStatus, UserId};

use crate::models::{
    Cart, CartLine, CartOwner, Kit, KitUpdate, NewKit, NewOrder, Order, OrderFilter, OrderItem,
    ShippingAddress,
};

use super::{CartStore, CatalogStore, OrderStore, StoreError};

/// Postgres-backed [`CatalogStore`].
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn create(&self, kit: NewKit) -> Result<Kit, StoreError> {
        let kit = sqlx::query_as::<_, Kit>(
            r"
            INSERT INTO kit (name, price, quantity, active)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, price, quantity, active
            ",
        )
        .bind(&kit.name)
        .bind(kit.price)
        .bind(kit.quantity)
        .bind(kit.active)
        .fetch_one(&self.pool)
        .await?;
        Ok(kit)
    }

    async fn get(&self, id: KitId) -> Result<Option<Kit>, StoreError> {
        let kit = sqlx::query_as::<_, Kit>(
            r"
            SELECT id, name, price, quantity, active
            FROM kit
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(kit)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Kit>, StoreError> {
        let kits = sqlx::query_as::<_, Kit>(
            r"
            SELECT id, name, price, quantity, active
            FROM kit
            WHERE active OR $1
            ORDER BY id
            ",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(kits)
    }

    async fn update(&self, id: KitId, update: KitUpdate) -> Result<Kit, StoreError> {
        let kit = sqlx::query_as::<_, Kit>(
            r"
            UPDATE kit
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                quantity = COALESCE($4, quantity),
                active = COALESCE($5, active),
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, price, quantity, active
            ",
        )
        .bind(id)
        .bind(update.name)
        .bind(update.price)
        .bind(update.quantity)
        .bind(update.active)
        .fetch_optional(&self.pool)
        .await?;
        kit.ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: KitId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM kit WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn reserve(&self, id: KitId, quantity: i32) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE kit
            SET quantity = quantity - $2, updated_at = now()
            WHERE id = $1 AND quantity >= $2
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Distinguish a missing kit from a stock shortfall.
        match self.get(id).await? {
            Some(_) => Err(StoreError::InsufficientStock { kit_id: id }),
            None => Err(StoreError::NotFound),
        }
    }

    async fn release(&self, id: KitId, quantity: i32) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE kit
            SET quantity = quantity + $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Postgres-backed [`CartStore`].
pub struct PgCarts {
    pool: PgPool,
}

impl PgCarts {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct LineRow {
            line_id: CartLineId,
            kit_id: KitId,
            quantity: i32,
            price_snapshot: Decimal,
        }

        let rows = sqlx::query_as::<_, LineRow>(
            r"
            SELECT line_id, kit_id, quantity, price_snapshot
            FROM cart_line
            WHERE cart_id = $1
            ORDER BY line_id
            ",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartLine {
                id: r.line_id,
                kit_id: r.kit_id,
                quantity: r.quantity,
                price_snapshot: r.price_snapshot,
            })
            .collect())
    }
}

fn duplicate_session(e: sqlx::Error, session_id: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::DuplicateSession(session_id.to_owned());
    }
    StoreError::Database(e)
}

fn owner_columns(owner: &CartOwner) -> (Option<UserId>, Option<String>) {
    match owner {
        CartOwner::User(id) => (Some(*id), None),
        CartOwner::Anonymous(token) => (None, Some(token.clone())),
    }
}

#[async_trait]
impl CartStore for PgCarts {
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        let (user_id, anon_token) = owner_columns(owner);

        // Lazy TTL purge for this owner before the lookup.
        sqlx::query(
            r"
            DELETE FROM cart
            WHERE expires_at <= now()
              AND (user_id = $1 OR anon_token = $2)
            ",
        )
        .bind(user_id)
        .bind(anon_token.clone())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r"
            SELECT id, expires_at, next_line_id
            FROM cart
            WHERE ($1::BIGINT IS NOT NULL AND user_id = $1)
               OR ($2::TEXT IS NOT NULL AND anon_token = $2)
            ",
        )
        .bind(user_id)
        .bind(anon_token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: CartId = row.try_get("id")?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        let next_line_id: i64 = row.try_get("next_line_id")?;
        let lines = self.load_lines(id).await?;

        Ok(Some(Cart {
            id,
            owner: owner.clone(),
            lines,
            expires_at,
            next_line_id,
        }))
    }

    async fn create(&self, owner: CartOwner) -> Result<Cart, StoreError> {
        let (user_id, anon_token) = owner_columns(&owner);
        let expires_at = Utc::now() + owner.ttl();

        let row = sqlx::query(
            r"
            INSERT INTO cart (user_id, anon_token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(anon_token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Cart {
            id: row.try_get("id")?,
            owner,
            lines: Vec::new(),
            expires_at,
            next_line_id: 1,
        })
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE cart SET expires_at = $2, next_line_id = $3 WHERE id = $1",
        )
        .bind(cart.id)
        .bind(cart.expires_at)
        .bind(cart.next_line_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        // Rewrite the line set; the model is authoritative for line IDs.
        sqlx::query("DELETE FROM cart_line WHERE cart_id = $1")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;

        for line in &cart.lines {
            sqlx::query(
                r"
                INSERT INTO cart_line (cart_id, line_id, kit_id, quantity, price_snapshot)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(cart.id)
            .bind(line.id)
            .bind(line.kit_id)
            .bind(line.quantity)
            .bind(line.price_snapshot)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: CartId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Postgres-backed [`OrderStore`].
pub struct PgOrders {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    owner_id: Option<UserId>,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total: Decimal,
    status: OrderStatus,
    external_session_id: String,
    external_payment_id: Option<String>,
    recipient: String,
    street: String,
    city: String,
    postal_code: String,
    country: String,
    tracking_code: Option<String>,
    created_at: DateTime<Utc>,
}

const ORDER_COLUMNS: &str = r"
    id, owner_id, subtotal, shipping_cost, total, status,
    external_session_id, external_payment_id,
    recipient, street, city, postal_code, country,
    tracking_code, created_at
";

impl PgOrders {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct ItemRow {
            kit_id: KitId,
            name: String,
            unit_price: Decimal,
            quantity: i32,
        }

        let rows = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT kit_id, name, unit_price, quantity
            FROM shop_order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| OrderItem {
                kit_id: r.kit_id,
                name: r.name,
                unit_price: r.unit_price,
                quantity: r.quantity,
            })
            .collect())
    }

    async fn assemble(&self, row: OrderRow) -> Result<Order, StoreError> {
        let items = self.load_items(row.id).await?;
        Ok(Order {
            id: row.id,
            owner: row.owner_id,
            items,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            total: row.total,
            status: row.status,
            external_session_id: row.external_session_id,
            external_payment_id: row.external_payment_id,
            shipping_address: ShippingAddress {
                recipient: row.recipient,
                street: row.street,
                city: row.city,
                postal_code: row.postal_code,
                country: row.country,
            },
            tracking_code: row.tracking_code,
            created_at: row.created_at,
        })
    }

    async fn assemble_all(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.assemble(row).await?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderStore for PgOrders {
    async fn create(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Claim the session first; a concurrently recorded refund or a
        // concurrent order insert conflicts here and aborts the whole
        // transaction.
        sqlx::query(
            r"
            INSERT INTO payment_session (session_id, resolution)
            VALUES ($1, 'FULFILLED')
            ",
        )
        .bind(&order.external_session_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_session(e, &order.external_session_id))?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop_order
                (owner_id, subtotal, shipping_cost, total, status,
                 external_session_id, external_payment_id,
                 recipient, street, city, postal_code, country)
            VALUES ($1, $2, $3, $4, 'PAID', $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.owner)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(&order.external_session_id)
        .bind(&order.external_payment_id)
        .bind(&order.shipping_address.recipient)
        .bind(&order.shipping_address.street)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.postal_code)
        .bind(&order.shipping_address.country)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| duplicate_session(e, &order.external_session_id))?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO shop_order_item (order_id, kit_id, name, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(row.id)
            .bind(item.kit_id)
            .bind(&item.name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Order {
            id: row.id,
            owner: order.owner,
            items: order.items,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
            status: row.status,
            external_session_id: order.external_session_id,
            external_payment_id: order.external_payment_id,
            shipping_address: order.shipping_address,
            tracking_code: None,
            created_at: row.created_at,
        })
    }

    async fn record_refund(&self, session_id: &str, reason: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO payment_session (session_id, resolution, detail)
            VALUES ($1, 'REFUNDED', $2)
            ",
        )
        .bind(session_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_session(e, session_id))?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop_order WHERE external_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop_order WHERE owner_id = $1 ORDER BY id DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        self.assemble_all(rows).await
    }

    async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM shop_order
            WHERE ($1::order_status IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR owner_id = $2)
            ORDER BY id DESC
            "
        ))
        .bind(filter.status)
        .bind(filter.owner)
        .fetch_all(&self.pool)
        .await?;
        self.assemble_all(rows).await
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM shop_order WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let current: OrderStatus = row.ok_or(StoreError::NotFound)?.try_get("status")?;

        if !current.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        sqlx::query("UPDATE shop_order SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get(id).await?.ok_or(StoreError::NotFound)
    }

    async fn set_tracking(&self, id: OrderId, code: &str) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM shop_order WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let current: OrderStatus = row.ok_or(StoreError::NotFound)?.try_get("status")?;

        // Tracking assignment implies SHIPPED, unless already shipped.
        if current != OrderStatus::Shipped && !current.can_transition_to(OrderStatus::Shipped) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: OrderStatus::Shipped,
            });
        }

        sqlx::query(
            r"
            UPDATE shop_order
            SET status = 'SHIPPED', tracking_code = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(code)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(id).await?.ok_or(StoreError::NotFound)
    }
}

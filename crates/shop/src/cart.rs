//! Cart operations.
//!
//! Thin orchestration over the cart store and the [`Cart`] model. The stock
//! check in [`CartService::add_item`] is deliberately soft: it gives the
//! buyer early feedback against the stock level at that instant and nothing
//! more. The authoritative check is the atomic reservation at fulfillment.

use std::sync::Arc;

use thiserror::Error;

use chrono::Utc;

use covey_core::{CartLineId, KitId, UserId};

use crate::models::{Cart, CartOwner};
use crate::stores::{CartStore, CatalogStore, StoreError};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity must be at least 1.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The referenced line is not in the caller's cart.
    #[error("cart line not found")]
    LineNotFound,

    /// The kit is inactive or the requested quantity exceeds current stock.
    /// Advisory only; stock may still change before fulfillment.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cart operations shared by the cart routes.
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl CartService {
    #[must_use]
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { carts, catalog }
    }

    /// The owner's cart, created lazily on first use.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn get_or_create(&self, owner: &CartOwner) -> Result<Cart, CartError> {
        if let Some(cart) = self.carts.find_by_owner(owner).await? {
            return Ok(cart);
        }
        Ok(self.carts.create(owner.clone()).await?)
    }

    /// Add `quantity` units of a kit to the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Unavailable`] when the kit is missing, inactive,
    /// or the requested quantity exceeds stock at this instant.
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        kit_id: KitId,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }

        let Some(kit) = self.catalog.get(kit_id).await? else {
            return Err(CartError::Unavailable("kit not found".to_owned()));
        };
        if !kit.active {
            return Err(CartError::Unavailable(format!(
                "{} is no longer available",
                kit.name
            )));
        }
        if kit.quantity < quantity {
            return Err(CartError::Unavailable(format!(
                "only {} unit(s) of {} in stock",
                kit.quantity, kit.name
            )));
        }

        let mut cart = self.get_or_create(owner).await?;
        cart.add_line(kit_id, quantity, kit.price, Utc::now());
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Set the quantity of a line in the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] for an unknown line.
    pub async fn update_item(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let mut cart = self
            .carts
            .find_by_owner(owner)
            .await?
            .ok_or(CartError::LineNotFound)?;
        if !cart.update_line(line_id, quantity, Utc::now()) {
            return Err(CartError::LineNotFound);
        }
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Remove a line from the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] for an unknown line.
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        line_id: CartLineId,
    ) -> Result<Cart, CartError> {
        let mut cart = self
            .carts
            .find_by_owner(owner)
            .await?
            .ok_or(CartError::LineNotFound)?;
        if !cart.remove_line(line_id, Utc::now()) {
            return Err(CartError::LineNotFound);
        }
        self.carts.save(&cart).await?;
        Ok(cart)
    }

    /// Remove every line from the owner's cart.
    ///
    /// # Errors
    ///
    /// Propagates storage failures. A missing cart is a no-op.
    pub async fn clear(&self, owner: &CartOwner) -> Result<(), CartError> {
        if let Some(mut cart) = self.carts.find_by_owner(owner).await? {
            cart.clear(Utc::now());
            self.carts.save(&cart).await?;
        }
        Ok(())
    }

    /// Merge the guest cart identified by `anon_token` into the user's cart.
    ///
    /// Shared kits have their quantities summed; remaining guest lines are
    /// appended; the guest cart is deleted afterwards. Called on login.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn merge(&self, anon_token: String, user: UserId) -> Result<Cart, CartError> {
        let user_owner = CartOwner::User(user);
        let guest_owner = CartOwner::Anonymous(anon_token);

        let Some(guest) = self.carts.find_by_owner(&guest_owner).await? else {
            return self.get_or_create(&user_owner).await;
        };

        let mut cart = self.get_or_create(&user_owner).await?;
        cart.merge_from(&guest, Utc::now());
        self.carts.save(&cart).await?;
        self.carts.delete(guest.id).await?;
        Ok(cart)
    }
}

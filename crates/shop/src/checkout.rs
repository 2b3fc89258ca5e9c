//! Checkout orchestration.
//!
//! Validates shipping input, runs price validation, and opens the hosted
//! payment session. Performs no stock mutation: reservation is strictly
//! deferred to the webhook handler, which works from the draft this module
//! serializes into the session metadata.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::models::{CartOwner, ShippingAddress, draft::DRAFT_METADATA_KEY};
use crate::payments::{CreateSessionRequest, PaymentError, PaymentGateway};
use crate::pricing::{self, PricingError};
use crate::stores::{CartStore, CatalogStore, StoreError};

/// Errors from checkout orchestration.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Malformed shipping input. Aborts before validation or payment.
    #[error("{0}")]
    Validation(String),

    /// The owner has no cart to check out.
    #[error("no cart to check out")]
    CartNotFound,

    /// Price/stock validation failed; no payment session was opened.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The payment gateway rejected the session request.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the caller needs to continue the payment flow.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckoutStarted {
    pub redirect_url: String,
    pub session_id: String,
}

/// Orchestrates checkout attempts.
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
    gateway: Arc<dyn PaymentGateway>,
    base_url: String,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        carts: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogStore>,
        gateway: Arc<dyn PaymentGateway>,
        base_url: String,
    ) -> Self {
        Self {
            carts,
            catalog,
            gateway,
            base_url,
        }
    }

    /// Begin a checkout for the owner's cart.
    ///
    /// On success a payment session exists at the gateway whose metadata
    /// carries the serialized validated draft; the caller is handed the
    /// redirect.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::Validation`] for malformed shipping input,
    /// [`CheckoutError::CartNotFound`] when the owner has never had a cart
    /// (or it expired), [`CheckoutError::Pricing`] when the cart is empty
    /// or any line is inactive or stock-short at validation time.
    pub async fn begin(
        &self,
        owner: &CartOwner,
        address: ShippingAddress,
    ) -> Result<CheckoutStarted, CheckoutError> {
        validate_address(&address)?;

        let cart = self
            .carts
            .find_by_owner(owner)
            .await?
            .ok_or(CheckoutError::CartNotFound)?;

        let draft = pricing::validate(&cart, self.catalog.as_ref(), address).await?;

        let draft_json = serde_json::to_string(&draft)
            .map_err(|e| CheckoutError::Validation(format!("draft serialization failed: {e}")))?;

        let mut metadata = HashMap::new();
        metadata.insert(DRAFT_METADATA_KEY.to_owned(), draft_json);
        metadata.insert("cart_id".to_owned(), draft.cart_id.to_string());
        metadata.insert(
            "owner_id".to_owned(),
            draft
                .owner
                .map_or_else(|| "null".to_owned(), |id| id.to_string()),
        );

        let session = self
            .gateway
            .create_session(CreateSessionRequest {
                amount: draft.total,
                success_url: format!("{}/checkout/success", self.base_url),
                cancel_url: format!("{}/cart", self.base_url),
                metadata,
            })
            .await?;

        tracing::info!(
            session_id = %session.id,
            cart_id = %draft.cart_id,
            total = %draft.total,
            "checkout session opened"
        );

        Ok(CheckoutStarted {
            redirect_url: session.redirect_url,
            session_id: session.id,
        })
    }
}

/// Validate required shipping fields and postal-code format.
///
/// Accepted postal formats: `12345` and `12345-6789`.
fn validate_address(address: &ShippingAddress) -> Result<(), CheckoutError> {
    let required = [
        ("recipient", &address.recipient),
        ("street", &address.street),
        ("city", &address.city),
        ("postal_code", &address.postal_code),
        ("country", &address.country),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(CheckoutError::Validation(format!("{field} is required")));
        }
    }

    if !valid_postal_code(&address.postal_code) {
        return Err(CheckoutError::Validation(
            "postal_code must be 5 digits, optionally followed by -4 digits".to_owned(),
        ));
    }

    Ok(())
}

fn valid_postal_code(code: &str) -> bool {
    let (zip, plus4) = match code.split_once('-') {
        Some((zip, plus4)) => (zip, Some(plus4)),
        None => (code, None),
    };
    let five = zip.len() == 5 && zip.bytes().all(|b| b.is_ascii_digit());
    let four = plus4.is_none_or(|p| p.len() == 4 && p.bytes().all(|b| b.is_ascii_digit()));
    five && four
}

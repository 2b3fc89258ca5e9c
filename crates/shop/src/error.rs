//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::payments::PaymentError;
use crate::pricing::PricingError;
use crate::stores::StoreError;
use crate::webhook::WebhookError;

/// Application-level error type for the shop.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Payment gateway call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Request shape or field values rejected before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Checkout-time price/stock validation failed.
    #[error("Inventory conflict: {0}")]
    InventoryConflict(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Webhook signature rejected. Always answered 400 so the gateway
    /// does not redeliver forged payloads.
    #[error("Webhook rejected: {0}")]
    WebhookRejected(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("resource not found".to_owned()),
            StoreError::InsufficientStock { kit_id } => {
                Self::InventoryConflict(format!("insufficient stock for kit {kit_id}"))
            }
            StoreError::InvalidTransition { from, to } => {
                Self::Validation(format!("cannot transition order from {from} to {to}"))
            }
            other => Self::Store(other),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::InvalidQuantity => Self::Validation(err.to_string()),
            CartError::LineNotFound => Self::NotFound(err.to_string()),
            CartError::Unavailable(msg) => Self::InventoryConflict(msg),
            CartError::Store(e) => e.into(),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(msg) => Self::Validation(msg),
            CheckoutError::CartNotFound => Self::NotFound(err.to_string()),
            CheckoutError::Pricing(e) => e.into(),
            CheckoutError::Payment(e) => Self::Payment(e),
            CheckoutError::Store(e) => e.into(),
        }
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::EmptyCart => Self::Validation(err.to_string()),
            PricingError::InventoryConflict(msg) => Self::InventoryConflict(msg),
            PricingError::Store(e) => e.into(),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Signature(e) => Self::WebhookRejected(e.to_string()),
            WebhookError::Store(e) => Self::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Store(_) | Self::Internal(_) | Self::Payment(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Validation(_) | Self::WebhookRejected(_) => StatusCode::BAD_REQUEST,
            Self::InventoryConflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Payment(_) => "Payment service error".to_string(),
            Self::WebhookRejected(_) => "Invalid signature".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    use covey_core::{KitId, OrderStatus};

    #[test]
    fn test_store_error_mapping() {
        let err: AppError = StoreError::NotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = StoreError::InsufficientStock {
            kit_id: KitId::new(4),
        }
        .into();
        assert!(matches!(err, AppError::InventoryConflict(_)));

        let err: AppError = StoreError::InvalidTransition {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Shipped,
        }
        .into();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_checkout_error_mapping() {
        let err: AppError = CheckoutError::CartNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = CheckoutError::Pricing(PricingError::EmptyCart).into();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                AppError::Validation("bad".to_owned()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::InventoryConflict("short".to_owned()),
                StatusCode::CONFLICT,
            ),
            (AppError::NotFound("gone".to_owned()), StatusCode::NOT_FOUND),
            (
                AppError::Unauthorized("login".to_owned()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Forbidden("admin".to_owned()),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::WebhookRejected("sig".to_owned()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Internal("boom".to_owned()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let response = AppError::Internal("connection string leaked".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

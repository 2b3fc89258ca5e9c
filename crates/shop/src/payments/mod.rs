//! External payment gateway interface.
//!
//! The gateway hosts the actual payment flow: checkout opens a session and
//! redirects the buyer; the gateway later reports the outcome through the
//! webhook endpoint, at least once and possibly concurrently. This module
//! defines the client trait, the notification wire format, and signature
//! verification.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

pub mod hosted;
pub mod signature;

pub use hosted::HostedGateway;
pub use signature::{SignatureError, SignatureVerifier};

/// Errors from gateway operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Transport-level failure talking to the gateway.
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the request.
    #[error("gateway rejected request ({status}): {message}")]
    Gateway { status: u16, message: String },
}

/// Request to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Amount to capture, in the store currency.
    pub amount: Decimal,
    /// Where the gateway redirects the buyer after payment.
    pub success_url: String,
    /// Where the gateway redirects the buyer on abandonment.
    pub cancel_url: String,
    /// Opaque metadata echoed back in the outcome notification. Carries the
    /// serialized order draft.
    pub metadata: HashMap<String, String>,
}

/// A hosted checkout session opened at the gateway.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    /// Gateway-assigned session ID; unique per checkout attempt.
    pub id: String,
    /// URL the buyer is redirected to.
    pub redirect_url: String,
}

/// Client for the external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session.
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, PaymentError>;

    /// Issue a full refund of a captured payment.
    async fn refund(&self, payment_id: &str) -> Result<(), PaymentError>;
}

/// Payment outcome reported by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum NotificationEvent {
    #[serde(rename = "payment.succeeded")]
    PaymentSucceeded,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    /// Event types this engine does not consume. Acknowledged and ignored.
    #[serde(other)]
    Other,
}

/// An inbound payment-outcome notification, after signature verification.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    pub event: NotificationEvent,
    /// The checkout session this outcome belongs to; the idempotency key.
    pub session_id: String,
    /// Gateway payment reference, present on success. Needed for refunds.
    #[serde(default)]
    pub payment_id: Option<String>,
    /// Metadata supplied when the session was opened, echoed back verbatim.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

//! Payment-outcome notification handling.
//!
//! One state machine per inbound notification:
//!
//! 1. authenticate the signature (the only non-2xx outcome);
//! 2. dedupe by `external_session_id`;
//! 3. deserialize the validated draft from the session metadata;
//! 4. reserve stock line by line;
//! 5. on any reservation failure, roll back already-reserved lines in
//!    reverse order, record the refund incident, refund the payment, alert,
//!    create no order;
//! 6. on full success, create the PAID order and delete the originating cart;
//! 7. acknowledge every authenticated outcome so the gateway stops retrying.
//!
//! Notifications arrive at least once and possibly concurrently. Order
//! creation and refund recording both claim the payment session's unique
//! key in storage, so two racing deliveries of one session resolve it
//! exactly once: a conflicting insert is a benign duplicate whose
//! reservations are released, and a refund is only issued once the
//! incident record wins the claim.

use std::sync::Arc;

use thiserror::Error;

use covey_core::{KitId, OrderId};

use crate::models::{OrderDraft, draft::DRAFT_METADATA_KEY};
use crate::notify::Notifier;
use crate::payments::{
    NotificationEvent, PaymentGateway, PaymentNotification, SignatureError, SignatureVerifier,
};
use crate::stores::{CartStore, CatalogStore, OrderStore, StoreError};

/// How a notification was resolved. Every variant is acknowledged with 200.
#[derive(Debug)]
pub enum WebhookOutcome {
    /// Stock reserved and order created.
    OrderCreated(OrderId),
    /// An order for this session already exists; no side effects.
    Duplicate,
    /// Reservation failed post-payment; stock rolled back, refund issued.
    RefundIssued,
    /// The gateway reported a failed payment; nothing to fulfill.
    PaymentFailed,
    /// An event type this engine does not consume.
    Ignored,
    /// Metadata did not contain a decodable draft. Logged for operator
    /// investigation; retrying would not help, so it is acknowledged.
    MalformedMetadata,
}

/// Failures that are surfaced to the gateway instead of acknowledged.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Authentication failure: non-retryable 400.
    #[error("webhook authentication failed: {0}")]
    Signature(#[from] SignatureError),

    /// Transient storage failure. Returned as 5xx so the gateway redelivers.
    #[error(transparent)]
    Store(StoreError),
}

/// Processes payment-outcome notifications.
pub struct WebhookProcessor {
    catalog: Arc<dyn CatalogStore>,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    verifier: SignatureVerifier,
}

impl WebhookProcessor {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        verifier: SignatureVerifier,
    ) -> Self {
        Self {
            catalog,
            carts,
            orders,
            gateway,
            notifier,
            verifier,
        }
    }

    /// Run the state machine for one raw notification delivery.
    ///
    /// # Errors
    ///
    /// [`WebhookError::Signature`] when authentication fails;
    /// [`WebhookError::Store`] on storage outage (safe to redeliver: no
    /// partial reservation survives an early return).
    pub async fn process(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome, WebhookError> {
        self.verifier.verify(payload, signature_header)?;

        let notification: PaymentNotification = match serde_json::from_slice(payload) {
            Ok(n) => n,
            Err(e) => {
                // Authenticated but undecodable; redelivery would not help.
                tracing::error!(error = %e, "webhook payload could not be decoded");
                return Ok(WebhookOutcome::MalformedMetadata);
            }
        };

        match notification.event {
            NotificationEvent::Other => Ok(WebhookOutcome::Ignored),
            NotificationEvent::PaymentFailed => {
                tracing::info!(
                    session_id = %notification.session_id,
                    "payment failed; cart retained, nothing to fulfill"
                );
                Ok(WebhookOutcome::PaymentFailed)
            }
            NotificationEvent::PaymentSucceeded => self.fulfill(notification).await,
        }
    }

    async fn fulfill(
        &self,
        notification: PaymentNotification,
    ) -> Result<WebhookOutcome, WebhookError> {
        let session_id = &notification.session_id;

        // Fast-path dedupe. The session-key claim in storage still
        // backstops the race where two deliveries pass this check together.
        if self
            .orders
            .find_by_session(session_id)
            .await
            .map_err(WebhookError::Store)?
            .is_some()
        {
            tracing::info!(session_id, "duplicate delivery, order already exists");
            return Ok(WebhookOutcome::Duplicate);
        }

        let Some(draft) = Self::decode_draft(&notification) else {
            return Ok(WebhookOutcome::MalformedMetadata);
        };

        let mut reserved: Vec<(KitId, i32)> = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            match self.catalog.reserve(line.kit_id, line.quantity).await {
                Ok(()) => reserved.push((line.kit_id, line.quantity)),
                Err(StoreError::InsufficientStock { .. } | StoreError::NotFound) => {
                    let reason = format!(
                        "kit {} oversold: {} unit(s) no longer available",
                        line.kit_id, line.quantity
                    );
                    tracing::warn!(session_id, %reason, "oversell detected after payment");
                    self.rollback(&reserved).await;
                    // Claim the session before refunding: a concurrent
                    // delivery may have consumed the stock we were denied
                    // and created the order for this very session.
                    return match self.orders.record_refund(session_id, &reason).await {
                        Ok(()) => {
                            self.refund(&notification).await;
                            self.notifier.fulfillment_failed(session_id, &reason).await;
                            Ok(WebhookOutcome::RefundIssued)
                        }
                        Err(StoreError::DuplicateSession(_)) => {
                            tracing::info!(
                                session_id,
                                "session resolved concurrently, refund skipped"
                            );
                            Ok(WebhookOutcome::Duplicate)
                        }
                        // Stock is restored and no refund went out, so a
                        // redelivery can safely retry the whole attempt.
                        Err(e) => Err(WebhookError::Store(e)),
                    };
                }
                Err(e) => {
                    self.rollback(&reserved).await;
                    return Err(WebhookError::Store(e));
                }
            }
        }

        let cart_id = draft.cart_id;
        let new_order =
            draft.into_new_order(session_id.clone(), notification.payment_id.clone());

        match self.orders.create(new_order).await {
            Ok(order) => {
                if let Err(e) = self.carts.delete(cart_id).await {
                    // The cart will age out via TTL; not worth failing over.
                    tracing::warn!(session_id, error = %e, "failed to delete fulfilled cart");
                }
                self.notifier.order_confirmed(&order).await;
                tracing::info!(session_id, order_id = %order.id, "order created");
                Ok(WebhookOutcome::OrderCreated(order.id))
            }
            Err(StoreError::DuplicateSession(_)) => {
                // A concurrent delivery won the insert; ours must not keep
                // the extra stock it reserved.
                self.rollback(&reserved).await;
                tracing::info!(session_id, "lost duplicate-insert race, reservations released");
                Ok(WebhookOutcome::Duplicate)
            }
            Err(e) => {
                self.rollback(&reserved).await;
                Err(WebhookError::Store(e))
            }
        }
    }

    fn decode_draft(notification: &PaymentNotification) -> Option<OrderDraft> {
        let Some(raw) = notification.metadata.get(DRAFT_METADATA_KEY) else {
            tracing::error!(
                session_id = %notification.session_id,
                "payment session metadata is missing the order draft"
            );
            return None;
        };
        match serde_json::from_str(raw) {
            Ok(draft) => Some(draft),
            Err(e) => {
                tracing::error!(
                    session_id = %notification.session_id,
                    error = %e,
                    "payment session metadata holds an undecodable draft"
                );
                None
            }
        }
    }

    /// Restore already-decremented stock, in reverse reservation order, so
    /// a failed attempt never leaves the catalog under-counted.
    async fn rollback(&self, reserved: &[(KitId, i32)]) {
        for (kit_id, quantity) in reserved.iter().rev() {
            if let Err(e) = self.catalog.release(*kit_id, *quantity).await {
                tracing::error!(
                    kit_id = %kit_id,
                    quantity,
                    error = %e,
                    "failed to restore reserved stock; manual correction required"
                );
            }
        }
    }

    async fn refund(&self, notification: &PaymentNotification) {
        let Some(payment_id) = &notification.payment_id else {
            tracing::error!(
                session_id = %notification.session_id,
                "cannot refund: notification carries no payment id"
            );
            return;
        };
        if let Err(e) = self.gateway.refund(payment_id).await {
            tracing::error!(
                session_id = %notification.session_id,
                payment_id,
                error = %e,
                "refund request failed; manual refund required"
            );
        }
    }
}

//! Outbound notifications.
//!
//! Best-effort by contract: a notification failure is logged and never rolls
//! back or blocks order finalization. The concrete delivery mechanism
//! (email, chat ops channel) lives behind this trait and outside the engine.

use async_trait::async_trait;

use crate::models::Order;

/// Sink for buyer and operator notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// An order was created; inform the buyer and the operator.
    async fn order_confirmed(&self, order: &Order);

    /// Fulfillment failed after payment; the buyer was (or will be)
    /// refunded and the operator must be alerted.
    async fn fulfillment_failed(&self, session_id: &str, reason: &str);
}

/// Notifier that only writes structured logs.
///
/// Stands in until an email sender is wired up; the operator alert path is
/// the log/alerting pipeline either way.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_confirmed(&self, order: &Order) {
        tracing::info!(
            order_id = %order.id,
            session_id = %order.external_session_id,
            total = %order.total,
            "order confirmed"
        );
    }

    async fn fulfillment_failed(&self, session_id: &str, reason: &str) {
        tracing::warn!(session_id, reason, "fulfillment failed, buyer refunded");
    }
}

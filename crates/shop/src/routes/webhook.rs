//! Payment gateway webhook endpoint.
//!
//! The raw body is handed to the processor untouched: the signature covers
//! the exact bytes the gateway sent, so this handler must not deserialize
//! before verification.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Header carrying the gateway's HMAC signature.
pub const SIGNATURE_HEADER: &str = "Payment-Signature";

/// `POST /webhook` - signed payment-outcome notifications.
///
/// Every authenticated delivery is acknowledged with 200 regardless of
/// outcome, so the gateway stops retrying. Signature failures get 400;
/// storage outages get 5xx so the gateway redelivers.
#[instrument(skip_all)]
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::WebhookRejected(format!("missing {SIGNATURE_HEADER} header"))
        })?;

    let outcome = state.webhook().process(&body, signature).await?;
    tracing::info!(?outcome, "webhook processed");

    Ok(Json(json!({ "received": true })))
}

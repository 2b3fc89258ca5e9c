//! Checkout route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::checkout::CheckoutStarted;
use crate::error::Result;
use crate::identity;
use crate::models::{Order, ShippingAddress};
use crate::state::AppState;

/// Request body for starting a checkout.
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub shipping_address: ShippingAddress,
}

/// `POST /checkout` - validate the cart and open a payment session.
#[instrument(skip_all)]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<CheckoutStarted>> {
    let owner = identity::resolve_owner(&session).await?;
    let started = state
        .checkout()
        .begin(&owner, body.shipping_address)
        .await?;
    Ok(Json(started))
}

/// Post-payment landing response.
///
/// `pending` is normal immediately after redirect: the gateway's webhook may
/// not have landed yet, and the client is expected to poll.
#[derive(Debug, Serialize)]
pub struct SuccessBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

/// `GET /checkout/success/{session_id}` - look up the order for a completed
/// payment session.
#[instrument(skip(state))]
pub async fn success(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SuccessBody>> {
    let order = state.orders().find_by_session(&session_id).await?;
    let body = match order {
        Some(order) => SuccessBody {
            status: "complete",
            order: Some(order),
        },
        None => SuccessBody {
            status: "pending",
            order: None,
        },
    };
    Ok(Json(body))
}

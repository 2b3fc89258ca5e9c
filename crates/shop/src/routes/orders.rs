//! Order history route handlers (authenticated callers only).

use axum::{
    Json,
    extract::{Path, State},
};
use tower_sessions::Session;
use tracing::instrument;

use covey_core::OrderId;

use crate::error::{AppError, Result};
use crate::identity;
use crate::models::Order;
use crate::state::AppState;

/// `GET /orders` - the caller's orders, newest first.
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, session: Session) -> Result<Json<Vec<Order>>> {
    let user = identity::require_user(&session).await?;
    let orders = state.orders().list_for_owner(user).await?;
    Ok(Json(orders))
}

/// `GET /orders/{id}` - one of the caller's orders.
///
/// An order belonging to someone else is indistinguishable from a missing
/// one.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let user = identity::require_user(&session).await?;
    let order = state
        .orders()
        .get(id)
        .await?
        .filter(|order| order.owner == Some(user))
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    Ok(Json(order))
}

//! Catalog and order administration route handlers.
//!
//! The two public catalog handlers live here too since they share the kit
//! response shape; everything under `/admin` requires the admin session flag.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use covey_core::{KitId, OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::identity;
use crate::models::{Kit, KitUpdate, NewKit, Order, OrderFilter};
use crate::state::AppState;

// =============================================================================
// Public catalog
// =============================================================================

/// `GET /kits` - active kits only.
#[instrument(skip_all)]
pub async fn list_active_kits(State(state): State<AppState>) -> Result<Json<Vec<Kit>>> {
    let kits = state.catalog().list(false).await?;
    Ok(Json(kits))
}

/// `GET /kits/{id}` - kit detail. Inactive kits are hidden from buyers.
#[instrument(skip(state))]
pub async fn show_kit(
    State(state): State<AppState>,
    Path(id): Path<KitId>,
) -> Result<Json<Kit>> {
    let kit = state
        .catalog()
        .get(id)
        .await?
        .filter(|kit| kit.active)
        .ok_or_else(|| AppError::NotFound(format!("kit {id} not found")))?;
    Ok(Json(kit))
}

// =============================================================================
// Admin: catalog
// =============================================================================

/// `GET /admin/kits` - full catalog, inactive included.
#[instrument(skip_all)]
pub async fn list_kits(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Kit>>> {
    identity::require_admin(&session).await?;
    let kits = state.catalog().list(true).await?;
    Ok(Json(kits))
}

/// `POST /admin/kits` - create a kit.
#[instrument(skip(state, session))]
pub async fn create_kit(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<NewKit>,
) -> Result<(StatusCode, Json<Kit>)> {
    identity::require_admin(&session).await?;
    validate_new_kit(&body)?;
    let kit = state.catalog().create(body).await?;
    Ok((StatusCode::CREATED, Json(kit)))
}

/// `PATCH /admin/kits/{id}` - partial update of a kit.
#[instrument(skip(state, session))]
pub async fn update_kit(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<KitId>,
    Json(body): Json<KitUpdate>,
) -> Result<Json<Kit>> {
    identity::require_admin(&session).await?;
    validate_kit_update(&body)?;
    let kit = state.catalog().update(id, body).await?;
    Ok(Json(kit))
}

/// `DELETE /admin/kits/{id}` - delete a kit.
#[instrument(skip(state, session))]
pub async fn delete_kit(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<KitId>,
) -> Result<StatusCode> {
    identity::require_admin(&session).await?;
    state.catalog().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_new_kit(kit: &NewKit) -> Result<()> {
    if kit.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_owned()));
    }
    if kit.price.is_sign_negative() {
        return Err(AppError::Validation("price must not be negative".to_owned()));
    }
    if kit.quantity < 0 {
        return Err(AppError::Validation(
            "quantity must not be negative".to_owned(),
        ));
    }
    Ok(())
}

fn validate_kit_update(update: &KitUpdate) -> Result<()> {
    if let Some(name) = &update.name
        && name.trim().is_empty()
    {
        return Err(AppError::Validation("name must not be empty".to_owned()));
    }
    if let Some(price) = update.price
        && price.is_sign_negative()
    {
        return Err(AppError::Validation("price must not be negative".to_owned()));
    }
    if let Some(quantity) = update.quantity
        && quantity < 0
    {
        return Err(AppError::Validation(
            "quantity must not be negative".to_owned(),
        ));
    }
    Ok(())
}

// =============================================================================
// Admin: orders
// =============================================================================

/// `GET /admin/orders` - all orders, optionally filtered by status/owner.
#[instrument(skip(state, session))]
pub async fn list_orders(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    identity::require_admin(&session).await?;
    let orders = state.orders().list(filter).await?;
    Ok(Json(orders))
}

/// Request body for an order status transition.
#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
    pub status: OrderStatus,
}

/// `PATCH /admin/orders/{id}/status` - administrative status transition.
#[instrument(skip(state, session))]
pub async fn set_order_status(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
    Json(body): Json<SetStatusBody>,
) -> Result<Json<Order>> {
    identity::require_admin(&session).await?;
    let order = state.orders().set_status(id, body.status).await?;
    Ok(Json(order))
}

/// Request body for attaching a tracking code.
#[derive(Debug, Deserialize)]
pub struct SetTrackingBody {
    pub tracking_code: String,
}

/// `PATCH /admin/orders/{id}/tracking` - attach a tracking code.
///
/// Implies a transition to `SHIPPED` when the order is still `PAID`.
#[instrument(skip(state, session))]
pub async fn set_order_tracking(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<OrderId>,
    Json(body): Json<SetTrackingBody>,
) -> Result<Json<Order>> {
    identity::require_admin(&session).await?;
    if body.tracking_code.trim().is_empty() {
        return Err(AppError::Validation(
            "tracking_code must not be empty".to_owned(),
        ));
    }
    let order = state.orders().set_tracking(id, &body.tracking_code).await?;
    Ok(Json(order))
}

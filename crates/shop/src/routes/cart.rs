//! Cart route handlers.
//!
//! Every handler resolves the caller to a [`CartOwner`] from the session, so
//! guests and authenticated users go through identical code paths.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use covey_core::{CartLineId, KitId};

use crate::error::Result;
use crate::identity;
use crate::models::{Cart, CartLine, session_keys};
use crate::state::AppState;

/// Cart response body.
#[derive(Debug, Serialize)]
pub struct CartBody {
    pub id: covey_core::CartId,
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl From<Cart> for CartBody {
    fn from(cart: Cart) -> Self {
        Self {
            item_count: cart.item_count(),
            id: cart.id,
            lines: cart.lines,
            expires_at: cart.expires_at,
        }
    }
}

/// Request body for adding a kit to the cart.
#[derive(Debug, Deserialize)]
pub struct AddItemBody {
    pub kit_id: KitId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Request body for changing a line's quantity.
#[derive(Debug, Deserialize)]
pub struct UpdateItemBody {
    pub quantity: i32,
}

/// `GET /cart` - the caller's cart, created lazily.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartBody>> {
    let owner = identity::resolve_owner(&session).await?;
    let cart = state.cart().get_or_create(&owner).await?;
    Ok(Json(cart.into()))
}

/// `POST /cart/items` - add a kit to the cart.
#[instrument(skip(state, session))]
pub async fn add_item(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItemBody>,
) -> Result<(StatusCode, Json<CartBody>)> {
    let owner = identity::resolve_owner(&session).await?;
    let cart = state
        .cart()
        .add_item(&owner, body.kit_id, body.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(cart.into())))
}

/// `PATCH /cart/items/{line_id}` - change a line's quantity.
#[instrument(skip(state, session))]
pub async fn update_item(
    State(state): State<AppState>,
    session: Session,
    Path(line_id): Path<CartLineId>,
    Json(body): Json<UpdateItemBody>,
) -> Result<Json<CartBody>> {
    let owner = identity::resolve_owner(&session).await?;
    let cart = state
        .cart()
        .update_item(&owner, line_id, body.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// `DELETE /cart/items/{line_id}` - remove a line.
#[instrument(skip(state, session))]
pub async fn remove_item(
    State(state): State<AppState>,
    session: Session,
    Path(line_id): Path<CartLineId>,
) -> Result<Json<CartBody>> {
    let owner = identity::resolve_owner(&session).await?;
    let cart = state.cart().remove_item(&owner, line_id).await?;
    Ok(Json(cart.into()))
}

/// `DELETE /cart` - empty the cart.
#[instrument(skip_all)]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    let owner = identity::resolve_owner(&session).await?;
    state.cart().clear(&owner).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /cart/merge` - absorb the guest cart into the user's cart.
///
/// Called by the auth flow right after login. The anonymous token is dropped
/// from the session once its cart has been absorbed.
#[instrument(skip_all)]
pub async fn merge(State(state): State<AppState>, session: Session) -> Result<Json<CartBody>> {
    let user = identity::require_user(&session).await?;

    let cart = match identity::anon_token(&session).await? {
        Some(token) => {
            let merged = state.cart().merge(token, user).await?;
            session
                .remove::<String>(session_keys::ANON_TOKEN)
                .await
                .map_err(|e| {
                    crate::error::AppError::Internal(format!("session store failure: {e}"))
                })?;
            merged
        }
        None => state.cart().get_or_create(&crate::models::CartOwner::User(user)).await?,
    };

    Ok(Json(cart.into()))
}

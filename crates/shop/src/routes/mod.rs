//! HTTP route handlers for the shop.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness check
//! GET    /health/ready              - Readiness check (storage reachable)
//! GET    /kits                      - Active catalog listing
//! GET    /kits/{id}                 - Kit detail
//!
//! # Cart (session-scoped)
//! GET    /cart                      - Current cart
//! POST   /cart/items                - Add a kit to the cart
//! PATCH  /cart/items/{line_id}      - Change a line's quantity
//! DELETE /cart/items/{line_id}      - Remove a line
//! DELETE /cart                      - Empty the cart
//! POST   /cart/merge                - Absorb the guest cart (requires auth)
//!
//! # Checkout
//! POST   /checkout                  - Validate cart, open payment session
//! GET    /checkout/success/{session_id} - Post-payment landing lookup
//!
//! # Payment gateway
//! POST   /webhook                   - Signed payment-outcome notifications
//!
//! # Orders (requires auth)
//! GET    /orders                    - Caller's order history
//! GET    /orders/{id}               - Caller's order detail
//!
//! # Admin (requires admin session)
//! GET    /admin/kits                - Full catalog, inactive included
//! POST   /admin/kits                - Create a kit
//! PATCH  /admin/kits/{id}           - Update price, stock, name, active flag
//! DELETE /admin/kits/{id}           - Delete a kit
//! GET    /admin/orders              - All orders, filter by status/owner
//! PATCH  /admin/orders/{id}/status  - Status transition
//! PATCH  /admin/orders/{id}/tracking - Attach tracking code (implies SHIPPED)
//! ```

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod webhook;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{line_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/merge", post(cart::merge))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/kits", get(admin::list_kits).post(admin::create_kit))
        .route(
            "/kits/{id}",
            patch(admin::update_kit).delete(admin::delete_kit),
        )
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}/status", patch(admin::set_order_status))
        .route("/orders/{id}/tracking", patch(admin::set_order_tracking))
}

/// Create all routes for the shop.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        // Public catalog
        .route("/kits", get(admin::list_active_kits))
        .route("/kits/{id}", get(admin::show_kit))
        // Cart routes
        .nest("/cart", cart_routes())
        // Checkout
        .route("/checkout", post(checkout::begin))
        .route("/checkout/success/{session_id}", get(checkout::success))
        // Payment gateway notifications
        .route("/webhook", post(webhook::receive))
        // Order history
        .nest("/orders", order_routes())
        // Admin
        .nest("/admin", admin_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies storage connectivity before returning OK.
async fn readiness(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::http::StatusCode {
    match state.catalog().list(false).await {
        Ok(_) => axum::http::StatusCode::OK,
        Err(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
    }
}

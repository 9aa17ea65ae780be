//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! # Cart
//! GET    /cart                          - Open cart
//! POST   /cart/items                    - Add a variant
//! PATCH  /cart/items/{id}               - Change quantity
//! DELETE /cart/items/{id}               - Remove item
//!
//! # Address book
//! GET    /addresses                     - List addresses
//! POST   /addresses                     - Save address
//! DELETE /addresses/{id}                - Delete address
//!
//! # Checkout and payment
//! POST   /checkout                      - Cart to order (+ payment session)
//! POST   /payments                      - Start or retry payment
//! POST   /webhooks/payments             - Provider webhook
//!
//! # Orders
//! GET    /orders                        - Own orders
//! GET    /orders/{id}                   - Order detail
//! POST   /orders/{id}/cancel            - Customer cancel
//! PATCH  /orders/{id}/status            - Staff status change
//! POST   /orders/{id}/items             - Staff add item
//! PATCH  /orders/{id}/items/{item_id}   - Staff change quantity
//! DELETE /orders/{id}/items/{item_id}   - Staff remove item
//!
//! # Reviews
//! GET    /reviews                       - Own reviews
//! POST   /reviews                       - Create review
//! PATCH  /reviews/{id}                  - Edit review
//! ```

pub mod addresses;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the address book routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route("/{id}", delete(addresses::delete))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/status", patch(orders::update_status))
        .route("/{id}/items", post(orders::add_item))
        .route(
            "/{id}/items/{item_id}",
            patch(orders::update_item).delete(orders::remove_item),
        )
}

/// Create the review routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reviews::index).post(reviews::create))
        .route("/{id}", patch(reviews::update))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .nest("/addresses", address_routes())
        .route("/checkout", post(checkout::checkout))
        .route("/payments", post(payments::initiate))
        .route("/webhooks/payments", post(webhooks::payments))
        .nest("/orders", order_routes())
        .nest("/reviews", review_routes())
}

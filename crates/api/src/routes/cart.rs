//! Cart route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use cartwright_core::{CartId, CartItemId, Money, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::CartItem;
use crate::services::CartService;
use crate::state::AppState;

/// The caller's open cart. `id` is null until the first item is added.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Option<CartId>,
    pub items: Vec<CartItem>,
    pub subtotal: Money,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub variant_id: VariantId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i32,
}

/// `GET /cart`
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool().clone())
        .get_open_cart(user.id)
        .await?;

    let view = match cart {
        Some(cart) => CartView {
            id: Some(cart.id),
            subtotal: cart.subtotal(),
            items: cart.items,
        },
        None => CartView {
            id: None,
            items: Vec::new(),
            subtotal: Money::ZERO,
        },
    };

    Ok(Json(view))
}

/// `POST /cart/items`
pub async fn add_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let item = CartService::new(state.pool().clone())
        .add_item(user.id, body.variant_id, body.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// `PATCH /cart/items/{id}`
pub async fn update_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<CartItemId>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<CartItem>> {
    let item = CartService::new(state.pool().clone())
        .update_item_quantity(user.id, id, body.quantity)
        .await?;

    Ok(Json(item))
}

/// `DELETE /cart/items/{id}`
pub async fn remove_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<CartItemId>,
) -> Result<StatusCode> {
    CartService::new(state.pool().clone())
        .remove_item(user.id, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

//! Order route handlers.
//!
//! Customers read and cancel their own orders; status changes and item
//! edits are staff-only.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use cartwright_core::{OrderId, OrderItemId, OrderStatus, VariantId};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::{RequireStaff, RequireUser};
use crate::models::Order;
use crate::services::OrderService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct AddOrderItemRequest {
    pub variant_id: VariantId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i32,
}

fn service(state: &AppState) -> OrderService {
    OrderService::new(state.pool().clone())
}

/// `GET /orders`
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(service(&state).list_for_user(user.id).await?))
}

/// `GET /orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(service(&state).get(user.id, id, user.is_staff).await?))
}

/// `POST /orders/{id}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(service(&state).cancel(user.id, id).await?))
}

/// `PATCH /orders/{id}/status`
pub async fn update_status(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Order>> {
    Ok(Json(service(&state).set_status(id, body.status).await?))
}

/// `POST /orders/{id}/items`
pub async fn add_item(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path(id): Path<OrderId>,
    Json(body): Json<AddOrderItemRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = service(&state)
        .add_item(id, body.variant_id, body.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `PATCH /orders/{id}/items/{item_id}`
pub async fn update_item(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path((id, item_id)): Path<(OrderId, OrderItemId)>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<Order>> {
    let order = service(&state)
        .change_item_quantity(id, item_id, body.quantity)
        .await?;
    Ok(Json(order))
}

/// `DELETE /orders/{id}/items/{item_id}`
pub async fn remove_item(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
    Path((id, item_id)): Path<(OrderId, OrderItemId)>,
) -> Result<Json<Order>> {
    Ok(Json(service(&state).remove_item(id, item_id).await?))
}

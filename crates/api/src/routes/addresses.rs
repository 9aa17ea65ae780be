//! Address book route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use cartwright_core::AddressId;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::{NewAddress, ShippingAddress};
use crate::services::AddressService;
use crate::state::AppState;

/// `GET /addresses`
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<ShippingAddress>>> {
    let addresses = AddressService::new(state.pool().clone())
        .list(user.id)
        .await?;
    Ok(Json(addresses))
}

/// `POST /addresses`
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<NewAddress>,
) -> Result<(StatusCode, Json<ShippingAddress>)> {
    let address = AddressService::new(state.pool().clone())
        .create(user.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// `DELETE /addresses/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressService::new(state.pool().clone())
        .delete(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

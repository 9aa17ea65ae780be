//! Payment initiation route handler.

use axum::{Json, extract::State, http::StatusCode};
use cartwright_core::{OrderId, PaymentMethod};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::PaymentSession;
use crate::services::PaymentService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub order_id: OrderId,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// `POST /payments`
#[instrument(skip_all, fields(user_id = %user.id, order_id = %body.order_id))]
pub async fn initiate(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentSession>)> {
    let session = PaymentService::new(
        state.pool(),
        state.payments(),
        state.config(),
        state.email(),
    )
    .initiate_payment(user.id, body.order_id, body.payment_method)
    .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

//! Checkout route handler.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::{CheckoutRequest, CheckoutResult, CheckoutService, PaymentService};
use crate::state::AppState;

/// `POST /checkout`
///
/// Returns the created order, plus the hosted payment session when a
/// payment method was given.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResult>)> {
    let payments = PaymentService::new(
        state.pool(),
        state.payments(),
        state.config(),
        state.email(),
    );
    let result = CheckoutService::new(state.pool(), payments)
        .checkout(user.id, &body)
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

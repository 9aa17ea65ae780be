//! Payment provider webhook handler.
//!
//! Signature failures are rejected with 400 and no state change. Once a
//! delivery is verified it is always acknowledged with 200; processing
//! failures are reported to Sentry instead of the provider.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, instrument};

use crate::error::AppError;
use crate::services::{OrderError, PaymentService};
use crate::state::AppState;

/// Header carrying the provider signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// `POST /webhooks/payments`
#[instrument(skip_all)]
pub async fn payments(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let service = PaymentService::new(
        state.pool(),
        state.payments(),
        state.config(),
        state.email(),
    );

    match service
        .handle_webhook(signature, &body, chrono::Utc::now().timestamp())
        .await
    {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Webhook handled");
            StatusCode::OK.into_response()
        }
        Err(err @ OrderError::SignatureInvalid(_)) => AppError::from(err).into_response(),
        Err(err) => {
            let event_id = sentry::capture_error(&err);
            error!(error = %err, sentry_event_id = %event_id, "Webhook processing failed");
            StatusCode::OK.into_response()
        }
    }
}

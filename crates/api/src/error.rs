//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::OrderError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Domain failure from a service.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Caller identity is missing or malformed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        Self::Order(e.into())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Order(err) => match err {
                OrderError::NotFound(_) | OrderError::Repository(RepositoryError::NotFound) => {
                    StatusCode::NOT_FOUND
                }
                OrderError::InvalidState(_)
                | OrderError::InsufficientStock(_)
                | OrderError::PaymentSetupFailed { .. }
                | OrderError::SignatureInvalid(_)
                | OrderError::BadRequest(_) => StatusCode::BAD_REQUEST,
                OrderError::Conflict(_) | OrderError::Repository(RepositoryError::Conflict(_)) => {
                    StatusCode::CONFLICT
                }
                OrderError::Forbidden => StatusCode::FORBIDDEN,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Order(
                    OrderError::Repository(
                        RepositoryError::Database(_) | RepositoryError::DataCorruption(_)
                    ) | OrderError::PaymentSetupFailed { .. }
                )
        )
    }

    /// Client-facing message and structured detail.
    fn body(&self) -> (String, Option<Value>) {
        match self {
            Self::Order(err) => match err {
                OrderError::InsufficientStock(stock) => (
                    "Insufficient stock".to_string(),
                    Some(json!({
                        "line": stock.line,
                        "variant_id": stock.variant_id,
                        "available": stock.available,
                        "requested": stock.requested,
                    })),
                ),
                OrderError::PaymentSetupFailed {
                    order_id,
                    order_number,
                    ..
                } => (
                    "Payment provider unavailable, please retry payment".to_string(),
                    Some(json!({
                        "order_id": order_id,
                        "order_number": order_number,
                    })),
                ),
                // Don't expose signature details to callers
                OrderError::SignatureInvalid(_) => ("Invalid webhook signature".to_string(), None),
                OrderError::Repository(RepositoryError::NotFound) => {
                    ("Not found".to_string(), None)
                }
                OrderError::Repository(_) => ("Internal server error".to_string(), None),
                other => (other.to_string(), None),
            },
            Self::Unauthorized(msg) => (msg.clone(), None),
            Self::Internal(_) => ("Internal server error".to_string(), None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if let Self::Order(OrderError::SignatureInvalid(err)) = &self {
            tracing::warn!(error = %err, "Webhook signature rejected");
        }

        let status = self.status();
        let (message, detail) = self.body();

        let body = match detail {
            Some(detail) => json!({ "error": message, "detail": detail }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::rules::ledger::InsufficientStock;
    use cartwright_core::{OrderId, OrderNumber, VariantId};
    use uuid::Uuid;

    use super::*;
    use crate::payments::{PaymentGatewayError, WebhookError};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(OrderError::NotFound("order")), StatusCode::NOT_FOUND),
            (
                AppError::from(OrderError::InvalidState("cart is empty".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(OrderError::Conflict("dup".into())),
                StatusCode::CONFLICT,
            ),
            (AppError::from(OrderError::Forbidden), StatusCode::FORBIDDEN),
            (
                AppError::from(RepositoryError::NotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(OrderError::SignatureInvalid(WebhookError::StaleTimestamp)),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Unauthorized("missing X-User-Id".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[tokio::test]
    async fn test_insufficient_stock_detail() {
        let err = AppError::from(OrderError::InsufficientStock(InsufficientStock {
            line: 0,
            variant_id: VariantId::new(9),
            available: 10,
            requested: 11,
        }));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Insufficient stock");
        assert_eq!(body["detail"]["variant_id"], 9);
        assert_eq!(body["detail"]["available"], 10);
        assert_eq!(body["detail"]["requested"], 11);
    }

    #[tokio::test]
    async fn test_payment_setup_failure_is_generic() {
        let err = AppError::from(OrderError::PaymentSetupFailed {
            order_id: OrderId::new(4),
            order_number: OrderNumber::from_uuid(Uuid::nil()),
            source: PaymentGatewayError::Api {
                status: 401,
                message: "Invalid API Key provided: sk_live_***".into(),
            },
        });

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(!body.to_string().contains("sk_live"));
        assert_eq!(body["detail"]["order_id"], 4);
    }

    #[tokio::test]
    async fn test_database_error_is_redacted() {
        let err = AppError::from(RepositoryError::DataCorruption("bad row 17".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
    }
}

//! Domain errors raised by the order services.

use cartwright_core::rules::checkout::CheckoutRejection;
use cartwright_core::rules::ledger::InsufficientStock;
use cartwright_core::rules::lifecycle::TransitionError;
use cartwright_core::{OrderId, OrderNumber};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::payments::{PaymentGatewayError, WebhookError};

/// Errors from cart, checkout, payment, order, and review operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Entity missing or not owned by the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Operation not allowed in the entity's current state.
    #[error("{0}")]
    InvalidState(String),

    /// A line asks for more than is in stock.
    #[error(transparent)]
    InsufficientStock(#[from] InsufficientStock),

    /// The order was committed but the provider session could not be created.
    /// The order is left in `payment_failed` and can be retried.
    #[error("payment provider unavailable for order {order_number}")]
    PaymentSetupFailed {
        order_id: OrderId,
        order_number: OrderNumber,
        #[source]
        source: PaymentGatewayError,
    },

    /// Webhook signature or payload rejected.
    #[error("webhook rejected: {0}")]
    SignatureInvalid(#[from] WebhookError),

    /// Request conflicts with existing data.
    #[error("{0}")]
    Conflict(String),

    /// Caller lacks the required role.
    #[error("forbidden")]
    Forbidden,

    /// Malformed or unsupported input.
    #[error("{0}")]
    BadRequest(String),

    /// Repository failure.
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for OrderError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

impl From<TransitionError> for OrderError {
    fn from(e: TransitionError) -> Self {
        Self::InvalidState(e.to_string())
    }
}

impl From<CheckoutRejection> for OrderError {
    fn from(e: CheckoutRejection) -> Self {
        match e {
            CheckoutRejection::EmptyCart => Self::InvalidState("cart is empty".to_string()),
            CheckoutRejection::InsufficientStock(stock) => Self::InsufficientStock(stock),
        }
    }
}

#[cfg(test)]
mod tests {
    use cartwright_core::{OrderStatus, VariantId};

    use super::*;

    #[test]
    fn test_conflict_is_lifted_from_repository() {
        let err = OrderError::from(RepositoryError::Conflict("product already reviewed".into()));
        assert!(matches!(err, OrderError::Conflict(ref m) if m == "product already reviewed"));

        let err = OrderError::from(RepositoryError::NotFound);
        assert!(matches!(err, OrderError::Repository(RepositoryError::NotFound)));
    }

    #[test]
    fn test_checkout_rejections() {
        let err = OrderError::from(CheckoutRejection::EmptyCart);
        assert!(matches!(err, OrderError::InvalidState(ref m) if m == "cart is empty"));

        let stock = InsufficientStock {
            line: 0,
            variant_id: VariantId::new(1),
            available: 10,
            requested: 11,
        };
        let err = OrderError::from(CheckoutRejection::InsufficientStock(stock));
        assert!(matches!(err, OrderError::InsufficientStock(s) if s.available == 10));
    }

    #[test]
    fn test_transition_error_is_invalid_state() {
        let err = OrderError::from(TransitionError::NotAllowed {
            from: OrderStatus::Cancelled,
            to: OrderStatus::Paid,
        });
        assert!(matches!(err, OrderError::InvalidState(_)));
    }
}

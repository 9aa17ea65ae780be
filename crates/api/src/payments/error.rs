//! Payment provider errors.

use cartwright_core::MoneyError;
use thiserror::Error;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    /// HTTP request failed.
    #[error("payment provider request failed: {0}")]
    Request(String),

    /// Provider returned a non-success status.
    #[error("payment provider error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the provider response.
    #[error("invalid payment provider response: {0}")]
    InvalidResponse(String),

    /// Provider did not answer within the configured timeout.
    #[error("payment provider timed out")]
    Timeout,

    /// Amount cannot be expressed in minor units.
    #[error(transparent)]
    Amount(#[from] MoneyError),
}

/// Errors from webhook verification and parsing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header is missing.
    #[error("missing signature header")]
    MissingSignature,

    /// Signature header could not be parsed or did not match.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Signature timestamp is outside the tolerance window.
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,

    /// Payload is not a well-formed event.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}

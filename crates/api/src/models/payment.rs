//! Payments against the external provider.

use cartwright_core::{Money, OrderId, PaymentId, PaymentMethod, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A payment attempt for an order. One per order, re-armed on retry.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    /// Starts at 1 and advances every time the payment is re-armed.
    pub attempt: i32,
    pub provider_session_id: Option<String>,
    pub provider_payment_intent_id: Option<String>,
    pub transaction_id: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the client needs to complete a hosted payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub payment_id: PaymentId,
    pub client_secret: Option<String>,
    pub checkout_url: Option<String>,
}

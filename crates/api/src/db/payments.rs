//! Payment persistence and the webhook replay guard.

use cartwright_core::{
    CurrencyCode, Money, OrderId, PaymentId, PaymentMethod, PaymentStatus,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgConnection;

use super::RepositoryError;
use crate::models::Payment;

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: PaymentId,
    order_id: OrderId,
    payment_method: PaymentMethod,
    amount: Decimal,
    currency: String,
    status: PaymentStatus,
    attempt: i32,
    provider_session_id: Option<String>,
    provider_payment_intent_id: Option<String>,
    transaction_id: Option<String>,
    gateway_response: Option<Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            payment_method: row.payment_method,
            amount: Money::new(row.amount),
            currency: row.currency,
            status: row.status,
            attempt: row.attempt,
            provider_session_id: row.provider_session_id,
            provider_payment_intent_id: row.provider_payment_intent_id,
            transaction_id: row.transaction_id,
            gateway_response: row.gateway_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PAYMENT_COLUMNS: &str = "id, order_id, payment_method, amount, currency, status, attempt, \
                               provider_session_id, provider_payment_intent_id, transaction_id, \
                               gateway_response, created_at, updated_at";

/// Create the order's payment, or re-arm the existing one for a new attempt.
///
/// Re-arming starts a new attempt and forgets the previous session. Events
/// from the old session either miss the provider-reference lookup or carry
/// the old attempt number, and reconciliation drops them.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn upsert_for_order(
    conn: &mut PgConnection,
    order_id: OrderId,
    method: PaymentMethod,
    amount: Money,
    currency: CurrencyCode,
) -> Result<Payment, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        r"
        INSERT INTO payment (order_id, payment_method, amount, currency, status)
        VALUES ($1, $2, $3, $4, 'requires_action')
        ON CONFLICT (order_id) DO UPDATE
            SET payment_method = EXCLUDED.payment_method,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                status = 'requires_action',
                attempt = payment.attempt + 1,
                provider_session_id = NULL,
                provider_payment_intent_id = NULL,
                updated_at = NOW()
        RETURNING {PAYMENT_COLUMNS}
        "
    ))
    .bind(order_id)
    .bind(method)
    .bind(amount.amount())
    .bind(currency.code())
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Point an unsettled payment at a new order total.
///
/// The open session was priced for the old total, so it is abandoned: the
/// attempt advances and the payment waits for a fresh initiation. Succeeded
/// and refunded payments are left alone. Returns whether a payment changed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn supersede_for_total(
    conn: &mut PgConnection,
    order_id: OrderId,
    amount: Money,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE payment
        SET amount = $2,
            status = 'pending',
            attempt = attempt + 1,
            provider_session_id = NULL,
            provider_payment_intent_id = NULL,
            updated_at = NOW()
        WHERE order_id = $1
          AND amount <> $2
          AND status NOT IN ('succeeded', 'refunded')
        ",
    )
    .bind(order_id)
    .bind(amount.amount())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Get the payment for an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_order(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<Payment>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment WHERE order_id = $1"
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Payment::from))
}

/// Lock a payment by id. Lock its order first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_id(
    conn: &mut PgConnection,
    id: PaymentId,
) -> Result<Option<Payment>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Payment::from))
}

/// Get a payment by id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_by_id(
    conn: &mut PgConnection,
    id: PaymentId,
) -> Result<Option<Payment>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Payment::from))
}

/// Find a payment by provider session or payment intent id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_by_provider_ref(
    conn: &mut PgConnection,
    session_id: Option<&str>,
    payment_intent_id: Option<&str>,
) -> Result<Option<Payment>, RepositoryError> {
    if session_id.is_none() && payment_intent_id.is_none() {
        return Ok(None);
    }

    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        r"
        SELECT {PAYMENT_COLUMNS}
        FROM payment
        WHERE ($1::TEXT IS NOT NULL AND provider_session_id = $1)
           OR ($2::TEXT IS NOT NULL AND provider_payment_intent_id = $2)
        ORDER BY id
        LIMIT 1
        "
    ))
    .bind(session_id)
    .bind(payment_intent_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Payment::from))
}

/// Record the provider session created for a payment.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_session(
    conn: &mut PgConnection,
    id: PaymentId,
    session_id: &str,
    payment_intent_id: Option<&str>,
    response: &Value,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE payment
        SET provider_session_id = $2,
            provider_payment_intent_id = $3,
            gateway_response = $4,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(session_id)
    .bind(payment_intent_id)
    .bind(response)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Mark a payment failed after the provider could not create a session.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_failed(
    conn: &mut PgConnection,
    id: PaymentId,
    reason: &str,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE payment
        SET status = 'failed',
            gateway_response = jsonb_build_object('error', $2::TEXT),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Apply a reconciled status. Provider ids are kept when the event omits them.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the transaction id belongs to
/// another payment.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn apply_status(
    conn: &mut PgConnection,
    id: PaymentId,
    status: PaymentStatus,
    transaction_id: Option<&str>,
    payment_intent_id: Option<&str>,
    response: &Value,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE payment
        SET status = $2,
            transaction_id = COALESCE($3, transaction_id),
            provider_payment_intent_id = COALESCE($4, provider_payment_intent_id),
            gateway_response = $5,
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(status)
    .bind(transaction_id)
    .bind(payment_intent_id)
    .bind(response)
    .execute(&mut *conn)
    .await
    .map_err(|e| super::map_constraint(e, "transaction id already recorded"))?;
    Ok(())
}

/// Record a processed webhook event. Returns `false` if it was seen before.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_event(
    conn: &mut PgConnection,
    event_id: &str,
    event_type: &str,
    payment_id: Option<PaymentId>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO payment_event (event_id, event_type, payment_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (event_id) DO NOTHING
        ",
    )
    .bind(event_id)
    .bind(event_type)
    .bind(payment_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

//! Webhook reconciliation against a real database.

#![allow(clippy::unwrap_used)]

use cartwright_api::db::payments;
use cartwright_api::models::{Order, Payment};
use cartwright_api::payments::webhook::compute_signature;
use cartwright_api::services::{OrderService, WebhookOutcome};
use cartwright_core::{CurrencyCode, Money, OrderStatus, PaymentMethod, PaymentStatus};
use cartwright_integration_tests::{TestContext, WEBHOOK_SECRET, create_user, create_variant};
use secrecy::SecretString;
use serde_json::json;
use uuid::Uuid;

const NOW: i64 = 1_760_000_000;

fn signed(payload: &str) -> String {
    let secret = SecretString::from(WEBHOOK_SECRET);
    let signature = compute_signature(&secret, &NOW.to_string(), payload).unwrap();
    format!("t={NOW},v1={signature}")
}

async fn order_with_payment(ctx: &TestContext) -> (Order, Payment) {
    let user = create_user(&ctx.pool).await;
    let (_, variant) = create_variant(&ctx.pool, Money::from_cents(4_800), 10).await;
    let order = ctx.place_order(user, &[(variant, 2)]).await;

    let mut conn = ctx.pool.acquire().await.unwrap();
    let payment = payments::upsert_for_order(
        &mut conn,
        order.id,
        PaymentMethod::Card,
        order.total_price,
        CurrencyCode::USD,
    )
    .await
    .unwrap();
    (order, payment)
}

fn session_event(event_type: &str, payment_id: i32, intent: &str) -> String {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": format!("cs_test_{}", Uuid::new_v4().simple()),
                "object": "checkout.session",
                "payment_status": "paid",
                "payment_intent": intent,
                "metadata": { "payment_id": payment_id.to_string() }
            }
        }
    })
    .to_string()
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_success_is_applied_once() {
    let ctx = TestContext::new().await;
    let (order, payment) = order_with_payment(&ctx).await;
    assert_eq!(payment.status, PaymentStatus::RequiresAction);

    let intent = format!("pi_{}", Uuid::new_v4().simple());
    let payload = session_event("checkout.session.completed", payment.id.as_i32(), &intent);
    let header = signed(&payload);
    let service = ctx.payments();

    let first = service
        .handle_webhook(Some(&header), &payload, NOW)
        .await
        .unwrap();
    assert_eq!(first, WebhookOutcome::Applied);

    let second = service
        .handle_webhook(Some(&header), &payload, NOW)
        .await
        .unwrap();
    assert_eq!(second, WebhookOutcome::Duplicate);

    let mut conn = ctx.pool.acquire().await.unwrap();
    let stored = payments::get_by_order(&mut conn, order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Succeeded);
    assert_eq!(stored.transaction_id.as_deref(), Some(intent.as_str()));

    let order = OrderService::new(ctx.pool.clone())
        .get(order.user_id, order.id, false)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_late_failure_does_not_undo_success() {
    let ctx = TestContext::new().await;
    let (order, payment) = order_with_payment(&ctx).await;
    let intent = format!("pi_{}", Uuid::new_v4().simple());
    let service = ctx.payments();

    let success = session_event("checkout.session.completed", payment.id.as_i32(), &intent);
    service
        .handle_webhook(Some(&signed(&success)), &success, NOW)
        .await
        .unwrap();

    let failure = session_event("checkout.session.expired", payment.id.as_i32(), &intent);
    let outcome = service
        .handle_webhook(Some(&signed(&failure)), &failure, NOW)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    let mut conn = ctx.pool.acquire().await.unwrap();
    let stored = payments::get_by_order(&mut conn, order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Succeeded);

    let order = OrderService::new(ctx.pool.clone())
        .get(order.user_id, order.id, false)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_failure_marks_order_payment_failed() {
    let ctx = TestContext::new().await;
    let (order, payment) = order_with_payment(&ctx).await;
    let intent = format!("pi_{}", Uuid::new_v4().simple());

    let failure = session_event(
        "checkout.session.async_payment_failed",
        payment.id.as_i32(),
        &intent,
    );
    ctx.payments()
        .handle_webhook(Some(&signed(&failure)), &failure, NOW)
        .await
        .unwrap();

    let mut conn = ctx.pool.acquire().await.unwrap();
    let stored = payments::get_by_order(&mut conn, order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    assert!(stored.transaction_id.is_none());

    let order = OrderService::new(ctx.pool.clone())
        .get(order.user_id, order.id, false)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PaymentFailed);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_payment_is_unmatched() {
    let ctx = TestContext::new().await;
    let payload = session_event(
        "checkout.session.completed",
        i32::MAX,
        &format!("pi_{}", Uuid::new_v4().simple()),
    );

    let outcome = ctx
        .payments()
        .handle_webhook(Some(&signed(&payload)), &payload, NOW)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Unmatched);
}

fn attempt_event(
    event_type: &str,
    payment_id: i32,
    session: &str,
    attempt: Option<i32>,
) -> String {
    let mut metadata = json!({ "payment_id": payment_id.to_string() });
    if let Some(attempt) = attempt {
        metadata["attempt"] = json!(attempt.to_string());
    }
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": session,
                "object": "checkout.session",
                "payment_status": "paid",
                "metadata": metadata
            }
        }
    })
    .to_string()
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_superseded_session_events_are_unmatched() {
    let ctx = TestContext::new().await;
    let (order, payment) = order_with_payment(&ctx).await;
    assert_eq!(payment.attempt, 1);

    let old_session = format!("cs_test_{}", Uuid::new_v4().simple());
    let new_session = format!("cs_test_{}", Uuid::new_v4().simple());

    let mut conn = ctx.pool.acquire().await.unwrap();
    payments::set_session(&mut conn, payment.id, &old_session, None, &json!({}))
        .await
        .unwrap();
    let rearmed = payments::upsert_for_order(
        &mut conn,
        order.id,
        PaymentMethod::Card,
        order.total_price,
        CurrencyCode::USD,
    )
    .await
    .unwrap();
    assert_eq!(rearmed.id, payment.id);
    assert_eq!(rearmed.attempt, 2);
    assert!(rearmed.provider_session_id.is_none());
    payments::set_session(&mut conn, payment.id, &new_session, None, &json!({}))
        .await
        .unwrap();
    drop(conn);

    let service = ctx.payments();

    // Expiry of the abandoned session carries the old attempt
    let expired = attempt_event(
        "checkout.session.expired",
        payment.id.as_i32(),
        &old_session,
        Some(1),
    );
    let outcome = service
        .handle_webhook(Some(&signed(&expired)), &expired, NOW)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Unmatched);

    // A capture on the abandoned session without attempt metadata
    let paid_old = attempt_event(
        "checkout.session.completed",
        payment.id.as_i32(),
        &old_session,
        None,
    );
    let outcome = service
        .handle_webhook(Some(&signed(&paid_old)), &paid_old, NOW)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Unmatched);

    let mut conn = ctx.pool.acquire().await.unwrap();
    let stored = payments::get_by_order(&mut conn, order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::RequiresAction);
    assert_eq!(stored.provider_session_id.as_deref(), Some(new_session.as_str()));

    let current = OrderService::new(ctx.pool.clone())
        .get(order.user_id, order.id, false)
        .await
        .unwrap();
    assert_eq!(current.status, OrderStatus::Pending);

    // The live session still settles the payment
    let paid_new = attempt_event(
        "checkout.session.completed",
        payment.id.as_i32(),
        &new_session,
        Some(2),
    );
    let outcome = service
        .handle_webhook(Some(&signed(&paid_new)), &paid_new, NOW)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Applied);

    let current = OrderService::new(ctx.pool.clone())
        .get(order.user_id, order.id, false)
        .await
        .unwrap();
    assert_eq!(current.status, OrderStatus::Paid);
}

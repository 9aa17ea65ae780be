//! Status transitions and staff item edits against a real database.

#![allow(clippy::unwrap_used)]

use cartwright_api::db::payments;
use cartwright_api::services::{OrderError, OrderService};
use cartwright_core::{CurrencyCode, Money, OrderStatus, PaymentMethod, PaymentStatus};
use serde_json::json;
use cartwright_integration_tests::{TestContext, create_user, create_variant, stock_of};

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_restocks_once() {
    let ctx = TestContext::new().await;
    let user = create_user(&ctx.pool).await;
    let (_, shirt) = create_variant(&ctx.pool, Money::from_cents(100_000), 10).await;
    let (_, jacket) = create_variant(&ctx.pool, Money::from_cents(80_000), 10).await;

    let order = ctx.place_order(user, &[(shirt, 2), (jacket, 1)]).await;
    assert_eq!(order.total_price, Money::from_cents(280_000));
    assert_eq!(stock_of(&ctx.pool, shirt).await, 8);
    assert_eq!(stock_of(&ctx.pool, jacket).await, 9);

    let orders = OrderService::new(ctx.pool.clone());
    let cancelled = orders.cancel(user, order.id).await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.total_price, Money::from_cents(280_000));
    assert_eq!(stock_of(&ctx.pool, shirt).await, 10);
    assert_eq!(stock_of(&ctx.pool, jacket).await, 10);

    // Re-saving the same status changes nothing
    let resaved = orders
        .set_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(resaved.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&ctx.pool, shirt).await, 10);
    assert_eq!(stock_of(&ctx.pool, jacket).await, 10);

    let err = orders
        .set_status(order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidState(_)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_customer_cannot_cancel_paid_order() {
    let ctx = TestContext::new().await;
    let user = create_user(&ctx.pool).await;
    let (_, variant) = create_variant(&ctx.pool, Money::from_cents(2_400), 5).await;

    let order = ctx.place_order(user, &[(variant, 1)]).await;
    let orders = OrderService::new(ctx.pool.clone());
    orders.set_status(order.id, OrderStatus::Paid).await.unwrap();

    let err = orders.cancel(user, order.id).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidState(_)));
    assert_eq!(stock_of(&ctx.pool, variant).await, 4);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_orders_are_private_to_their_owner() {
    let ctx = TestContext::new().await;
    let owner = create_user(&ctx.pool).await;
    let other = create_user(&ctx.pool).await;
    let (_, variant) = create_variant(&ctx.pool, Money::from_cents(2_400), 5).await;

    let order = ctx.place_order(owner, &[(variant, 1)]).await;
    let orders = OrderService::new(ctx.pool.clone());

    assert!(matches!(
        orders.get(other, order.id, false).await,
        Err(OrderError::NotFound("order"))
    ));
    assert!(matches!(
        orders.cancel(other, order.id).await,
        Err(OrderError::NotFound("order"))
    ));
    assert_eq!(orders.get(other, order.id, true).await.unwrap().id, order.id);
    assert_eq!(orders.list_for_user(owner).await.unwrap().len(), 1);
    assert!(orders.list_for_user(other).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_item_edits_adjust_stock_and_total() {
    let ctx = TestContext::new().await;
    let user = create_user(&ctx.pool).await;
    let (_, shirt) = create_variant(&ctx.pool, Money::from_cents(100_000), 10).await;
    let (_, mug) = create_variant(&ctx.pool, Money::from_cents(1_500), 20).await;

    let order = ctx.place_order(user, &[(shirt, 2)]).await;
    let item_id = order.items[0].id;
    let orders = OrderService::new(ctx.pool.clone());

    let order = orders
        .change_item_quantity(order.id, item_id, 5)
        .await
        .unwrap();
    assert_eq!(stock_of(&ctx.pool, shirt).await, 5);
    assert_eq!(order.total_price, Money::from_cents(500_000));

    let order = orders
        .change_item_quantity(order.id, item_id, 1)
        .await
        .unwrap();
    assert_eq!(stock_of(&ctx.pool, shirt).await, 9);
    assert_eq!(order.total_price, Money::from_cents(100_000));

    let order = orders.add_item(order.id, mug, 4).await.unwrap();
    assert_eq!(stock_of(&ctx.pool, mug).await, 16);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total_price, Money::from_cents(106_000));

    let order = orders.remove_item(order.id, item_id).await.unwrap();
    assert_eq!(stock_of(&ctx.pool, shirt).await, 10);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.total_price, Money::from_cents(6_000));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_clamped_debit_is_not_over_credited() {
    let ctx = TestContext::new().await;
    let user = create_user(&ctx.pool).await;
    let (_, variant) = create_variant(&ctx.pool, Money::from_cents(2_400), 3).await;

    let order = ctx.place_order(user, &[(variant, 3)]).await;
    let item_id = order.items[0].id;
    assert_eq!(stock_of(&ctx.pool, variant).await, 0);

    // Stock is exhausted, so the extra debit is clamped to zero
    let orders = OrderService::new(ctx.pool.clone());
    orders
        .change_item_quantity(order.id, item_id, 6)
        .await
        .unwrap();
    assert_eq!(stock_of(&ctx.pool, variant).await, 0);

    // Only the three units actually taken come back
    orders.set_status(order.id, OrderStatus::Cancelled).await.unwrap();
    assert_eq!(stock_of(&ctx.pool, variant).await, 3);

    let err = orders.remove_item(order.id, item_id).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidState(_)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_paid_order_items_are_frozen() {
    let ctx = TestContext::new().await;
    let user = create_user(&ctx.pool).await;
    let (_, shirt) = create_variant(&ctx.pool, Money::from_cents(100_000), 10).await;
    let (_, mug) = create_variant(&ctx.pool, Money::from_cents(1_500), 20).await;

    let order = ctx.place_order(user, &[(shirt, 2)]).await;
    let item_id = order.items[0].id;
    let orders = OrderService::new(ctx.pool.clone());
    orders.set_status(order.id, OrderStatus::Paid).await.unwrap();

    assert!(matches!(
        orders.add_item(order.id, mug, 1).await,
        Err(OrderError::InvalidState(_))
    ));
    assert!(matches!(
        orders.change_item_quantity(order.id, item_id, 5).await,
        Err(OrderError::InvalidState(_))
    ));
    assert!(matches!(
        orders.remove_item(order.id, item_id).await,
        Err(OrderError::InvalidState(_))
    ));

    assert_eq!(stock_of(&ctx.pool, shirt).await, 8);
    assert_eq!(stock_of(&ctx.pool, mug).await, 20);
    let unchanged = orders.get(user, order.id, false).await.unwrap();
    assert_eq!(unchanged.total_price, Money::from_cents(200_000));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_item_edit_supersedes_open_payment() {
    let ctx = TestContext::new().await;
    let user = create_user(&ctx.pool).await;
    let (_, shirt) = create_variant(&ctx.pool, Money::from_cents(100_000), 10).await;

    let order = ctx.place_order(user, &[(shirt, 2)]).await;
    let item_id = order.items[0].id;

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
    let session = format!("cs_test_{}", uuid::Uuid::new_v4().simple());
    payments::set_session(&mut conn, payment.id, &session, None, &json!({}))
        .await
        .unwrap();
    drop(conn);

    let order = OrderService::new(ctx.pool.clone())
        .change_item_quantity(order.id, item_id, 3)
        .await
        .unwrap();
    assert_eq!(order.total_price, Money::from_cents(300_000));

    let mut conn = ctx.pool.acquire().await.unwrap();
    let stored = payments::get_by_order(&mut conn, order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.amount, Money::from_cents(300_000));
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(stored.attempt, payment.attempt + 1);
    assert!(stored.provider_session_id.is_none());
}

//! Order, order item, and shipping snapshot persistence.
//!
//! The order total is written only by [`recompute_total`] through
//! [`set_total`], which touches nothing but `total_price`.

use cartwright_core::rules::totals::{line_total, order_total};
use cartwright_core::{
    CartId, Money, OrderId, OrderItemId, OrderNumber, OrderStatus, UserId, VariantId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use super::RepositoryError;
use crate::models::{NewOrderItem, Order, OrderItem, OrderShippingAddress, ShippingAddress};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: OrderNumber,
    user_id: UserId,
    cart_id: CartId,
    status: OrderStatus,
    total_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            cart_id: row.cart_id,
            status: row.status,
            total_price: Money::new(row.total_price),
            created_at: row.created_at,
            updated_at: row.updated_at,
            items: Vec::new(),
            shipping_address: None,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    variant_id: Option<VariantId>,
    quantity: i32,
    unit_price_at_purchase: Decimal,
    total_price_at_purchase: Decimal,
    product_name_snapshot: String,
    variant_details_snapshot: Option<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            variant_id: row.variant_id,
            quantity: row.quantity,
            unit_price_at_purchase: Money::new(row.unit_price_at_purchase),
            total_price_at_purchase: Money::new(row.total_price_at_purchase),
            product_name_snapshot: row.product_name_snapshot,
            variant_details_snapshot: row.variant_details_snapshot,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShippingRow {
    full_name: String,
    address_line_1: String,
    address_line_2: Option<String>,
    city: String,
    state: Option<String>,
    postal_code: String,
    country: String,
    phone_number: Option<String>,
}

impl From<ShippingRow> for OrderShippingAddress {
    fn from(row: ShippingRow) -> Self {
        Self {
            full_name: row.full_name,
            address_line_1: row.address_line_1,
            address_line_2: row.address_line_2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            phone_number: row.phone_number,
        }
    }
}

const ORDER_COLUMNS: &str =
    "id, order_number, user_id, cart_id, status, total_price, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, variant_id, quantity, unit_price_at_purchase, \
                            total_price_at_purchase, product_name_snapshot, variant_details_snapshot";

// =============================================================================
// Orders
// =============================================================================

/// Insert a new pending order with a zero total.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the cart already has an order.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn insert_order(
    conn: &mut PgConnection,
    user_id: UserId,
    cart_id: CartId,
    order_number: OrderNumber,
) -> Result<Order, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO customer_order (user_id, order_number, cart_id, status, total_price)
        VALUES ($1, $2, $3, 'pending', 0)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(order_number)
    .bind(cart_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| super::map_constraint(e, "cart already has an order"))?;

    Ok(row.into())
}

/// Get an order header.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Order::from))
}

/// Lock an order row so its status can be compared and changed atomically.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_order(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Order::from))
}

/// List a user's orders, newest first (headers only).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<Order>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM customer_order WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Order::from).collect())
}

/// Load an order with its items and shipping snapshot.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn load_details(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let Some(mut order) = get_order(conn, id).await? else {
        return Ok(None);
    };

    order.items = list_items(conn, id).await?;
    order.shipping_address = get_shipping_snapshot(conn, id).await?;
    Ok(Some(order))
}

/// Set an order's status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE customer_order SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Write an order's total. Touches only `total_price`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_total(
    conn: &mut PgConnection,
    id: OrderId,
    total: Money,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE customer_order SET total_price = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(total.amount())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Recompute an order's total from its remaining items and persist it.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn recompute_total(conn: &mut PgConnection, id: OrderId) -> Result<Money, RepositoryError> {
    let lines = sqlx::query_as::<_, (Decimal, i32)>(
        "SELECT unit_price_at_purchase, quantity FROM order_item WHERE order_id = $1",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let total = order_total(
        lines
            .into_iter()
            .map(|(unit, quantity)| (Money::new(unit), quantity)),
    );

    set_total(conn, id, total).await?;
    Ok(total)
}

// =============================================================================
// Order items
// =============================================================================

/// Insert an order item with its price and name snapshots.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_item(
    conn: &mut PgConnection,
    item: &NewOrderItem,
) -> Result<OrderItem, RepositoryError> {
    let row = sqlx::query_as::<_, OrderItemRow>(&format!(
        r"
        INSERT INTO order_item (
            order_id, variant_id, quantity, unit_price_at_purchase,
            total_price_at_purchase, product_name_snapshot, variant_details_snapshot
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {ITEM_COLUMNS}
        "
    ))
    .bind(item.order_id)
    .bind(item.variant_id)
    .bind(item.quantity)
    .bind(item.unit_price.amount())
    .bind(line_total(item.unit_price, item.quantity).amount())
    .bind(&item.product_name)
    .bind(&item.variant_details)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// List an order's items in creation order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_item WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

/// Lock one item of an order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item_id: OrderItemId,
) -> Result<Option<OrderItem>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_item WHERE id = $1 AND order_id = $2 FOR UPDATE"
    ))
    .bind(item_id)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(OrderItem::from))
}

/// Change an item's quantity and its line total.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the item does not exist.
/// Returns `RepositoryError::Database` if the query fails.
pub async fn update_item_quantity(
    conn: &mut PgConnection,
    item: &OrderItem,
    quantity: i32,
) -> Result<OrderItem, RepositoryError> {
    let row = sqlx::query_as::<_, OrderItemRow>(&format!(
        r"
        UPDATE order_item
        SET quantity = $2, total_price_at_purchase = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {ITEM_COLUMNS}
        "
    ))
    .bind(item.id)
    .bind(quantity)
    .bind(line_total(item.unit_price_at_purchase, quantity).amount())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

/// Delete an order item. Journal rows keep the movement with a null item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete_item(conn: &mut PgConnection, item_id: OrderItemId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM order_item WHERE id = $1")
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Shipping snapshot
// =============================================================================

/// Copy a saved address onto the order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_shipping_snapshot(
    conn: &mut PgConnection,
    order_id: OrderId,
    address: &ShippingAddress,
) -> Result<OrderShippingAddress, RepositoryError> {
    let row = sqlx::query_as::<_, ShippingRow>(
        r"
        INSERT INTO order_shipping_address (
            order_id, full_name, address_line_1, address_line_2, city,
            state, postal_code, country, phone_number
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING full_name, address_line_1, address_line_2, city,
                  state, postal_code, country, phone_number
        ",
    )
    .bind(order_id)
    .bind(&address.full_name)
    .bind(&address.address_line_1)
    .bind(&address.address_line_2)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.postal_code)
    .bind(&address.country)
    .bind(&address.phone_number)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Get an order's shipping snapshot.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_shipping_snapshot(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<OrderShippingAddress>, RepositoryError> {
    let row = sqlx::query_as::<_, ShippingRow>(
        r"
        SELECT full_name, address_line_1, address_line_2, city,
               state, postal_code, country, phone_number
        FROM order_shipping_address
        WHERE order_id = $1
        ",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(OrderShippingAddress::from))
}

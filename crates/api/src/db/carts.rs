//! Cart persistence.

use cartwright_core::{CartId, CartItemId, Money, UserId, VariantId};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use super::{RepositoryError, map_constraint};
use crate::models::{Cart, CartItem};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    checked_out: bool,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            checked_out: row.checked_out,
            items: Vec::new(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    variant_id: VariantId,
    quantity: i32,
    price_at_addition: Decimal,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            variant_id: row.variant_id,
            quantity: row.quantity,
            price_at_addition: Money::new(row.price_at_addition),
        }
    }
}

/// Get the user's open cart header, if any.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_open_cart(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<Cart>, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(
        "SELECT id, user_id, checked_out FROM cart WHERE user_id = $1 AND NOT checked_out",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Cart::from))
}

/// Get the user's open cart, creating it if needed.
///
/// Concurrent callers race on the partial unique index; the loser's insert
/// is a no-op and both read back the same row.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the user does not exist.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn get_or_create_open_cart(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Cart, RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO cart (user_id)
        VALUES ($1)
        ON CONFLICT (user_id) WHERE NOT checked_out DO NOTHING
        ",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_constraint(e, "unknown user"))?;

    find_open_cart(conn, user_id)
        .await?
        .ok_or(RepositoryError::NotFound)
}

/// Lock a cart row for checkout.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_cart(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Option<Cart>, RepositoryError> {
    let row = sqlx::query_as::<_, CartRow>(
        "SELECT id, user_id, checked_out FROM cart WHERE id = $1 FOR UPDATE",
    )
    .bind(cart_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Cart::from))
}

/// List a cart's items in the order they were added.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_items(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<CartItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT id, cart_id, variant_id, quantity, price_at_addition
        FROM cart_item
        WHERE cart_id = $1
        ORDER BY id
        ",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(CartItem::from).collect())
}

/// Add a variant to a cart, or increment its quantity if already present.
///
/// The price snapshot is taken only when the line is first created.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn upsert_item(
    conn: &mut PgConnection,
    cart_id: CartId,
    variant_id: VariantId,
    quantity: i32,
    price: Money,
) -> Result<CartItem, RepositoryError> {
    let row = sqlx::query_as::<_, CartItemRow>(
        r"
        INSERT INTO cart_item (cart_id, variant_id, quantity, price_at_addition)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cart_id, variant_id) DO UPDATE
            SET quantity = cart_item.quantity + EXCLUDED.quantity,
                updated_at = NOW()
        RETURNING id, cart_id, variant_id, quantity, price_at_addition
        ",
    )
    .bind(cart_id)
    .bind(variant_id)
    .bind(quantity)
    .bind(price.amount())
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE cart SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;

    Ok(row.into())
}

/// Lock a cart item owned by `user_id`, returning it with its cart's
/// `checked_out` flag.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_item_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    item_id: CartItemId,
) -> Result<Option<(CartItem, bool)>, RepositoryError> {
    #[derive(sqlx::FromRow)]
    struct Row {
        #[sqlx(flatten)]
        item: CartItemRow,
        checked_out: bool,
    }

    let row = sqlx::query_as::<_, Row>(
        r"
        SELECT ci.id, ci.cart_id, ci.variant_id, ci.quantity, ci.price_at_addition,
               c.checked_out
        FROM cart_item ci
        JOIN cart c ON c.id = ci.cart_id
        WHERE ci.id = $1 AND c.user_id = $2
        FOR UPDATE
        ",
    )
    .bind(item_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|r| (r.item.into(), r.checked_out)))
}

/// Set a cart item's quantity.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the item does not exist.
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_item_quantity(
    conn: &mut PgConnection,
    item_id: CartItemId,
    quantity: i32,
) -> Result<CartItem, RepositoryError> {
    let row = sqlx::query_as::<_, CartItemRow>(
        r"
        UPDATE cart_item
        SET quantity = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING id, cart_id, variant_id, quantity, price_at_addition
        ",
    )
    .bind(item_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

/// Delete a cart item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete_item(conn: &mut PgConnection, item_id: CartItemId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM cart_item WHERE id = $1")
        .bind(item_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Mark a cart checked out. Returns `false` if it already was.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_checked_out(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE cart SET checked_out = TRUE, updated_at = NOW() WHERE id = $1 AND NOT checked_out",
    )
    .bind(cart_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

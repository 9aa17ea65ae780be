//! Inventory ledger persistence.
//!
//! Every stock change goes through [`adjust`], which locks the variant row,
//! clamps at zero, writes the new level, and journals the movement. Callers
//! own the transaction.

use std::collections::HashMap;

use cartwright_core::rules::ledger::{Adjustment, plan_adjustment};
use cartwright_core::{Money, OrderItemId, ProductId, StockReason, VariantId};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::{debug, warn};

use super::RepositoryError;
use crate::models::Variant;

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    product_id: Option<ProductId>,
    product_title: Option<String>,
    sku: String,
    size: Option<String>,
    color: Option<String>,
    price: Decimal,
    stock: i32,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_title: row.product_title,
            sku: row.sku,
            size: row.size,
            color: row.color,
            price: Money::new(row.price),
            stock: row.stock,
        }
    }
}

/// Get a variant with its product title.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_variant(
    conn: &mut PgConnection,
    id: VariantId,
) -> Result<Option<Variant>, RepositoryError> {
    let row = sqlx::query_as::<_, VariantRow>(
        r"
        SELECT v.id, v.product_id, p.title AS product_title,
               v.sku, v.size, v.color, v.price, v.stock
        FROM product_variant v
        LEFT JOIN product p ON p.id = v.product_id
        WHERE v.id = $1
        ",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Variant::from))
}

/// Lock variant rows and return their stock levels.
///
/// Rows are locked in ascending id order so that concurrent checkouts over
/// overlapping variants cannot deadlock. Missing variants are absent from
/// the result.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_variants(
    conn: &mut PgConnection,
    ids: &[VariantId],
) -> Result<HashMap<VariantId, i32>, RepositoryError> {
    let ids: Vec<i32> = ids.iter().map(VariantId::as_i32).collect();

    let rows = sqlx::query_as::<_, (VariantId, i32)>(
        r"
        SELECT id, stock
        FROM product_variant
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        ",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Apply a signed stock change and journal it.
///
/// The resulting stock is clamped at zero; the returned [`Adjustment`]
/// carries the delta that was actually applied.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the variant does not exist.
/// Returns `RepositoryError::Database` if a query fails.
pub async fn adjust(
    conn: &mut PgConnection,
    variant_id: VariantId,
    delta: i32,
    order_item: Option<OrderItemId>,
    reason: StockReason,
) -> Result<Adjustment, RepositoryError> {
    let current: i32 =
        sqlx::query_scalar("SELECT stock FROM product_variant WHERE id = $1 FOR UPDATE")
            .bind(variant_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(RepositoryError::NotFound)?;

    let adjustment = plan_adjustment(current, delta);

    if adjustment.applied != 0 {
        sqlx::query("UPDATE product_variant SET stock = $2, updated_at = NOW() WHERE id = $1")
            .bind(variant_id)
            .bind(adjustment.resulting_stock)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query(
        r"
        INSERT INTO stock_movement (variant_id, order_item_id, requested, applied, reason)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(variant_id)
    .bind(order_item)
    .bind(adjustment.requested)
    .bind(adjustment.applied)
    .bind(reason)
    .execute(&mut *conn)
    .await?;

    if adjustment.clamped() {
        warn!(
            variant_id = %variant_id,
            requested = adjustment.requested,
            applied = adjustment.applied,
            reason = %reason,
            "Stock adjustment clamped at zero"
        );
    } else {
        debug!(
            variant_id = %variant_id,
            applied = adjustment.applied,
            stock = adjustment.resulting_stock,
            reason = %reason,
            "Stock adjusted"
        );
    }

    Ok(adjustment)
}

/// Sum of every applied delta journaled against an order item.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn net_applied_for_item(
    conn: &mut PgConnection,
    order_item: OrderItemId,
) -> Result<i32, RepositoryError> {
    let net: i32 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(applied), 0)::INT4 FROM stock_movement WHERE order_item_id = $1",
    )
    .bind(order_item)
    .fetch_one(&mut *conn)
    .await?;

    Ok(net)
}

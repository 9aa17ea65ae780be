//! Staff edits to an order's items.
//!
//! Every edit adjusts the ledger by the quantity change and recomputes the
//! order total in the same transaction. An unsettled payment priced for the
//! old total is superseded, so the customer has to start payment again.

use cartwright_core::rules::ledger::reversal_for;
use cartwright_core::{OrderId, OrderItemId, StockReason, VariantId};
use sqlx::PgConnection;
use tracing::{info, instrument};

use super::OrderError;
use super::orders::OrderService;
use crate::db::{inventory, orders, payments};
use crate::models::{NewOrderItem, Order};

impl OrderService {
    /// Add a variant to an order at its current price.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown order or variant and
    /// `OrderError::InvalidState` if the order is paid, cancelled, or refunded.
    #[instrument(skip(self), fields(order_id = %order_id, variant_id = %variant_id))]
    pub async fn add_item(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<Order, OrderError> {
        require_positive(quantity)?;

        let mut tx = self.pool.begin().await?;
        lock_editable(&mut tx, order_id).await?;

        let variant = inventory::get_variant(&mut tx, variant_id)
            .await?
            .ok_or(OrderError::NotFound("variant"))?;

        let item = orders::insert_item(
            &mut tx,
            &NewOrderItem {
                order_id,
                variant_id: variant.id,
                quantity,
                unit_price: variant.price,
                product_name: variant.display_name(),
                variant_details: variant.details(),
            },
        )
        .await?;

        inventory::adjust(
            &mut tx,
            variant.id,
            -quantity,
            Some(item.id),
            StockReason::ItemAdded,
        )
        .await?;

        let order = finish(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(item_id = %item.id, total = %order.total_price, "Order item added");
        Ok(order)
    }

    /// Change an item's quantity.
    ///
    /// An increase debits the difference. A decrease credits the difference,
    /// capped at what the item still holds.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown order or item and
    /// `OrderError::InvalidState` if the order is paid, cancelled, or refunded.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn change_item_quantity(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        quantity: i32,
    ) -> Result<Order, OrderError> {
        require_positive(quantity)?;

        let mut tx = self.pool.begin().await?;
        lock_editable(&mut tx, order_id).await?;

        let item = orders::lock_item(&mut tx, order_id, item_id)
            .await?
            .ok_or(OrderError::NotFound("order item"))?;

        let delta = quantity - item.quantity;
        if let Some(variant_id) = item.variant_id {
            if delta > 0 {
                inventory::adjust(
                    &mut tx,
                    variant_id,
                    -delta,
                    Some(item.id),
                    StockReason::ItemQuantityChanged,
                )
                .await?;
            } else if delta < 0 {
                let held = reversal_for(inventory::net_applied_for_item(&mut tx, item.id).await?);
                let credit = (-delta).min(held);
                if credit > 0 {
                    inventory::adjust(
                        &mut tx,
                        variant_id,
                        credit,
                        Some(item.id),
                        StockReason::ItemQuantityChanged,
                    )
                    .await?;
                }
            }
        }

        orders::update_item_quantity(&mut tx, &item, quantity).await?;

        let order = finish(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(delta, total = %order.total_price, "Order item quantity changed");
        Ok(order)
    }

    /// Remove an item, returning its outstanding debit to stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown order or item and
    /// `OrderError::InvalidState` if the order is paid, cancelled, or refunded.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;
        lock_editable(&mut tx, order_id).await?;

        let item = orders::lock_item(&mut tx, order_id, item_id)
            .await?
            .ok_or(OrderError::NotFound("order item"))?;

        if let Some(variant_id) = item.variant_id {
            let credit = reversal_for(inventory::net_applied_for_item(&mut tx, item.id).await?);
            if credit > 0 {
                inventory::adjust(
                    &mut tx,
                    variant_id,
                    credit,
                    Some(item.id),
                    StockReason::ItemRemoved,
                )
                .await?;
            }
        }

        orders::delete_item(&mut tx, item.id).await?;

        let order = finish(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(total = %order.total_price, "Order item removed");
        Ok(order)
    }
}

fn require_positive(quantity: i32) -> Result<(), OrderError> {
    if quantity > 0 {
        Ok(())
    } else {
        Err(OrderError::BadRequest(
            "quantity must be greater than zero".to_string(),
        ))
    }
}

async fn lock_editable(conn: &mut PgConnection, order_id: OrderId) -> Result<(), OrderError> {
    let order = orders::lock_order(conn, order_id)
        .await?
        .ok_or(OrderError::NotFound("order"))?;

    if !order.status.is_editable() {
        return Err(OrderError::InvalidState(format!(
            "items of a {} order cannot be changed",
            order.status
        )));
    }
    Ok(())
}

/// Recompute the total, supersede a stale payment, and reload the order.
async fn finish(conn: &mut PgConnection, order_id: OrderId) -> Result<Order, OrderError> {
    orders::recompute_total(conn, order_id).await?;
    let order = orders::load_details(conn, order_id)
        .await?
        .ok_or(OrderError::NotFound("order"))?;

    if payments::supersede_for_total(conn, order_id, order.total_price).await? {
        info!(total = %order.total_price, "Open payment superseded by new total");
    }
    Ok(order)
}

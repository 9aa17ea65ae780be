//! Order reads and lifecycle transitions.
//!
//! Entering `cancelled` or `refunded` credits every item's net debit back to
//! the ledger. The previous status is read under `FOR UPDATE` in the same
//! transaction, so re-saving a restocking status never credits twice.

use cartwright_core::rules::ledger::reversal_for;
use cartwright_core::rules::lifecycle::{Actor, plan_transition};
use cartwright_core::{OrderId, OrderStatus, StockReason, UserId};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};

use super::OrderError;
use crate::db::{inventory, orders};
use crate::models::{Order, OrderItem};

/// Order service.
pub struct OrderService {
    pub(super) pool: PgPool,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List the caller's orders (headers only), newest first.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::list_for_user(&mut conn, user_id).await?)
    }

    /// Get an order with items and shipping snapshot.
    ///
    /// Customers only see their own orders; staff see all.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is missing or hidden.
    pub async fn get(
        &self,
        user_id: UserId,
        order_id: OrderId,
        is_staff: bool,
    ) -> Result<Order, OrderError> {
        let mut conn = self.pool.acquire().await?;
        orders::load_details(&mut conn, order_id)
            .await?
            .filter(|o| is_staff || o.user_id == user_id)
            .ok_or(OrderError::NotFound("order"))
    }

    /// Customer cancellation of their own unpaid order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order is not the caller's and
    /// `OrderError::InvalidState` once the order is past payment.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        self.transition(order_id, OrderStatus::Cancelled, Actor::Customer, Some(user_id))
            .await
    }

    /// Staff status change.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown order and
    /// `OrderError::InvalidState` if the transition table forbids the change.
    #[instrument(skip(self), fields(order_id = %order_id, status = %status))]
    pub async fn set_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        self.transition(order_id, status, Actor::Staff, None).await
    }

    async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        actor: Actor,
        owner: Option<UserId>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock_order(&mut tx, order_id)
            .await?
            .filter(|o| owner.is_none_or(|user| o.user_id == user))
            .ok_or(OrderError::NotFound("order"))?;

        let transition = plan_transition(order.status, target, actor)?;

        if transition.changed() {
            if transition.restock {
                let items = orders::list_items(&mut tx, order.id).await?;
                let restored = restock_items(&mut tx, &items).await?;
                info!(order_id = %order.id, units = restored, "Order restocked");
            }
            orders::set_status(&mut tx, order.id, target).await?;
        }

        let updated = orders::load_details(&mut tx, order.id)
            .await?
            .ok_or(OrderError::NotFound("order"))?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            from = %transition.from,
            to = %transition.to,
            changed = transition.changed(),
            "Order status saved"
        );

        Ok(updated)
    }
}

/// Credit each item's outstanding debit back to the ledger.
///
/// Returns the number of units restored.
async fn restock_items(conn: &mut PgConnection, items: &[OrderItem]) -> Result<i32, OrderError> {
    let mut restored = 0;

    for item in items {
        let Some(variant_id) = item.variant_id else {
            warn!(item_id = %item.id, "Variant deleted, cannot restock item");
            continue;
        };

        let credit = reversal_for(inventory::net_applied_for_item(conn, item.id).await?);
        if credit > 0 {
            let adjustment = inventory::adjust(
                conn,
                variant_id,
                credit,
                Some(item.id),
                StockReason::OrderRestocked,
            )
            .await?;
            restored += adjustment.applied;
        }
    }

    Ok(restored)
}

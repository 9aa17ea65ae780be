//! Checkout orchestration.
//!
//! Turns an open cart into an order in one transaction:
//!
//! 1. Lock the cart and check it is open and owned by the caller
//! 2. Reject an empty cart, then resolve the shipping address
//! 3. Lock every variant row (ascending id) and validate stock for all lines
//! 4. Create the order, its items, and the shipping snapshot
//! 5. Debit the ledger per item, close the cart, and recompute the total
//! 6. Optionally arm a payment, commit, then request a provider session

use cartwright_core::rules::checkout::{CheckoutRejection, validate_cart};
use cartwright_core::{
    AddressId, CartId, OrderNumber, PaymentMethod, StockReason, UserId, VariantId,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use super::OrderError;
use super::payments::PaymentService;
use crate::db::{addresses, carts, inventory, orders, payments, users};
use crate::models::{NewOrderItem, Order, PaymentSession};

/// Checkout request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub cart_id: CartId,
    pub shipping_address_id: AddressId,
    /// When present, a hosted payment session is started after the order commits.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// A completed checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentSession>,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    payments: PaymentService<'a>,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, payments: PaymentService<'a>) -> Self {
        Self { pool, payments }
    }

    /// Check out the caller's cart.
    ///
    /// # Errors
    ///
    /// - `OrderError::NotFound` if the cart is missing, closed, or not the
    ///   caller's, or the address is not the caller's
    /// - `OrderError::InvalidState` if the cart is empty
    /// - `OrderError::InsufficientStock` naming the first line that cannot
    ///   be fulfilled; nothing is written in that case
    /// - `OrderError::BadRequest` for an unsupported payment method
    /// - `OrderError::PaymentSetupFailed` if the order committed but the
    ///   provider session could not be created
    #[instrument(skip(self, request), fields(user_id = %user_id, cart_id = %request.cart_id))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResult, OrderError> {
        if let Some(method) = request.payment_method
            && !method.is_supported()
        {
            return Err(OrderError::BadRequest(format!(
                "payment method {method} is not supported"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let cart = carts::lock_cart(&mut tx, request.cart_id)
            .await?
            .filter(|c| c.user_id == user_id && !c.checked_out)
            .ok_or(OrderError::NotFound("cart"))?;

        let cart_items = carts::list_items(&mut tx, cart.id).await?;
        if cart_items.is_empty() {
            return Err(CheckoutRejection::EmptyCart.into());
        }

        let address = addresses::get_for_user(&mut tx, user_id, request.shipping_address_id)
            .await?
            .ok_or(OrderError::NotFound("shipping address"))?;

        let lines: Vec<(VariantId, i32)> = cart_items
            .iter()
            .map(|item| (item.variant_id, item.quantity))
            .collect();
        let variant_ids: Vec<VariantId> = lines.iter().map(|(id, _)| *id).collect();
        let stock = inventory::lock_variants(&mut tx, &variant_ids).await?;

        if let Err(rejection) = validate_cart(&lines, &stock) {
            warn!(error = %rejection, "Checkout rejected");
            return Err(rejection.into());
        }

        let mut order = orders::insert_order(&mut tx, user_id, cart.id, OrderNumber::generate()).await?;

        for cart_item in &cart_items {
            let variant = inventory::get_variant(&mut tx, cart_item.variant_id)
                .await?
                .ok_or(OrderError::NotFound("variant"))?;

            let item = orders::insert_item(
                &mut tx,
                &NewOrderItem {
                    order_id: order.id,
                    variant_id: variant.id,
                    quantity: cart_item.quantity,
                    unit_price: cart_item.price_at_addition,
                    product_name: variant.display_name(),
                    variant_details: variant.details(),
                },
            )
            .await?;

            inventory::adjust(
                &mut tx,
                variant.id,
                -item.quantity,
                Some(item.id),
                StockReason::Checkout,
            )
            .await?;

            order.items.push(item);
        }

        order.shipping_address =
            Some(orders::insert_shipping_snapshot(&mut tx, order.id, &address).await?);

        if !carts::mark_checked_out(&mut tx, cart.id).await? {
            return Err(OrderError::InvalidState(
                "cart has already been checked out".to_string(),
            ));
        }

        order.total_price = orders::recompute_total(&mut tx, order.id).await?;

        let payment = match request.payment_method {
            Some(method) if order.total_price.is_positive() => Some(
                payments::upsert_for_order(
                    &mut tx,
                    order.id,
                    method,
                    order.total_price,
                    self.payments.currency(),
                )
                .await?,
            ),
            Some(_) => {
                warn!(order_id = %order.id, "Order total is zero, skipping payment");
                None
            }
            None => None,
        };

        let customer = users::get_user(&mut tx, user_id).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            items = order.items.len(),
            total = %order.total_price,
            "Order created"
        );

        let session = match payment {
            Some(payment) => Some(
                self.payments
                    .start_session(&order, &payment, customer.map(|u| u.email))
                    .await?,
            ),
            None => None,
        };

        Ok(CheckoutResult {
            order,
            payment: session,
        })
    }
}

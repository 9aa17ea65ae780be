//! Cart aggregate operations.

use cartwright_core::{CartItemId, UserId, VariantId};
use sqlx::PgPool;
use tracing::{info, instrument};

use super::OrderError;
use crate::db::{carts, inventory};
use crate::models::{Cart, CartItem};

/// Cart service.
pub struct CartService {
    pool: PgPool,
}

impl CartService {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The user's open cart with its items, or an empty one if none exists.
    ///
    /// # Errors
    ///
    /// Returns error if the database query fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_open_cart(&self, user_id: UserId) -> Result<Option<Cart>, OrderError> {
        let mut conn = self.pool.acquire().await?;

        let Some(mut cart) = carts::find_open_cart(&mut conn, user_id).await? else {
            return Ok(None);
        };
        cart.items = carts::list_items(&mut conn, cart.id).await?;
        Ok(Some(cart))
    }

    /// Add a variant to the user's open cart, creating the cart if needed.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::BadRequest` for a non-positive quantity and
    /// `OrderError::NotFound` for an unknown variant.
    #[instrument(skip(self), fields(user_id = %user_id, variant_id = %variant_id))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<CartItem, OrderError> {
        if quantity <= 0 {
            return Err(OrderError::BadRequest(
                "quantity must be greater than zero".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let variant = inventory::get_variant(&mut tx, variant_id)
            .await?
            .ok_or(OrderError::NotFound("variant"))?;

        let cart = carts::get_or_create_open_cart(&mut tx, user_id).await?;
        let item = carts::upsert_item(&mut tx, cart.id, variant.id, quantity, variant.price).await?;

        tx.commit().await?;

        info!(cart_id = %cart.id, quantity = item.quantity, "Cart item added");
        Ok(item)
    }

    /// Set the quantity of an item in the user's open cart.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::BadRequest` for a non-positive quantity,
    /// `OrderError::NotFound` if the item is not the user's, and
    /// `OrderError::InvalidState` if the cart is checked out.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, OrderError> {
        if quantity <= 0 {
            return Err(OrderError::BadRequest(
                "quantity must be greater than zero".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let item = lock_open_item(&mut tx, user_id, item_id).await?;
        let item = carts::set_item_quantity(&mut tx, item.id, quantity).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Remove an item from the user's open cart.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the item is not the user's and
    /// `OrderError::InvalidState` if the cart is checked out.
    #[instrument(skip(self), fields(user_id = %user_id, item_id = %item_id))]
    pub async fn remove_item(&self, user_id: UserId, item_id: CartItemId) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await?;
        let item = lock_open_item(&mut tx, user_id, item_id).await?;
        carts::delete_item(&mut tx, item.id).await?;
        tx.commit().await?;

        Ok(())
    }
}

async fn lock_open_item(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
    item_id: CartItemId,
) -> Result<CartItem, OrderError> {
    let (item, checked_out) = carts::lock_item_for_user(conn, user_id, item_id)
        .await?
        .ok_or(OrderError::NotFound("cart item"))?;

    if checked_out {
        return Err(OrderError::InvalidState(
            "cart has already been checked out".to_string(),
        ));
    }
    Ok(item)
}

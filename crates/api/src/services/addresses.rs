//! Shipping address book.

use cartwright_core::{AddressId, UserId};
use sqlx::PgPool;
use tracing::{info, instrument};

use super::OrderError;
use crate::db::addresses;
use crate::models::{NewAddress, ShippingAddress};

/// Address book service.
pub struct AddressService {
    pool: PgPool,
}

impl AddressService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns error if the database query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<ShippingAddress>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        Ok(addresses::list_for_user(&mut conn, user_id).await?)
    }

    /// Save an address. A new default replaces the previous one.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::BadRequest` if a required field is blank.
    #[instrument(skip(self, address), fields(user_id = %user_id))]
    pub async fn create(
        &self,
        user_id: UserId,
        address: &NewAddress,
    ) -> Result<ShippingAddress, OrderError> {
        if let Some(field) = address.missing_field() {
            return Err(OrderError::BadRequest(format!("{field} is required")));
        }

        let mut tx = self.pool.begin().await?;
        if address.is_default {
            addresses::clear_default(&mut tx, user_id).await?;
        }
        let saved = addresses::create(&mut tx, user_id, address).await?;
        tx.commit().await?;

        info!(address_id = %saved.id, is_default = saved.is_default, "Address saved");
        Ok(saved)
    }

    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the address is not the user's.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), OrderError> {
        let mut conn = self.pool.acquire().await?;
        if addresses::delete(&mut conn, user_id, id).await? {
            Ok(())
        } else {
            Err(OrderError::NotFound("address"))
        }
    }
}

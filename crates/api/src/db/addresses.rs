//! Shipping address book persistence.

use cartwright_core::{AddressId, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use super::{RepositoryError, map_constraint};
use crate::models::{NewAddress, ShippingAddress};

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    full_name: String,
    address_line_1: String,
    address_line_2: Option<String>,
    city: String,
    state: Option<String>,
    postal_code: String,
    country: String,
    phone_number: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for ShippingAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            full_name: row.full_name,
            address_line_1: row.address_line_1,
            address_line_2: row.address_line_2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            phone_number: row.phone_number,
            is_default: row.is_default,
            created_at: row.created_at,
        }
    }
}

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, address_line_1, address_line_2, city, \
                               state, postal_code, country, phone_number, is_default, created_at";

/// List a user's addresses, default first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<ShippingAddress>, RepositoryError> {
    let rows = sqlx::query_as::<_, AddressRow>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM shipping_address WHERE user_id = $1 \
         ORDER BY is_default DESC, id"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(ShippingAddress::from).collect())
}

/// Get an address if it belongs to `user_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    id: AddressId,
) -> Result<Option<ShippingAddress>, RepositoryError> {
    let row = sqlx::query_as::<_, AddressRow>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM shipping_address WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(ShippingAddress::from))
}

/// Clear the user's default address flag.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear_default(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE shipping_address SET is_default = FALSE, updated_at = NOW() \
         WHERE user_id = $1 AND is_default",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert an address.
///
/// Callers creating a default address must call [`clear_default`] first in
/// the same transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the user does not exist or already
/// has a default address.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn create(
    conn: &mut PgConnection,
    user_id: UserId,
    address: &NewAddress,
) -> Result<ShippingAddress, RepositoryError> {
    let row = sqlx::query_as::<_, AddressRow>(&format!(
        r"
        INSERT INTO shipping_address (
            user_id, full_name, address_line_1, address_line_2, city,
            state, postal_code, country, phone_number, is_default
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ADDRESS_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(&address.full_name)
    .bind(&address.address_line_1)
    .bind(&address.address_line_2)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.postal_code)
    .bind(&address.country)
    .bind(&address.phone_number)
    .bind(address.is_default)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_constraint(e, "address conflicts with an existing default"))?;

    Ok(row.into())
}

/// Delete an address owned by `user_id`. Returns `false` if none matched.
///
/// Orders keep their own snapshot, so deleting never affects history.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn delete(
    conn: &mut PgConnection,
    user_id: UserId,
    id: AddressId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM shipping_address WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

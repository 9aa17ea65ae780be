//! Database operations for the Cartwright `PostgreSQL` store.
//!
//! ## Tables
//!
//! - `app_user` - Local projection of externally issued identities
//! - `product`, `product_variant` - Catalog rows; variant `stock` is owned by [`inventory`]
//! - `cart`, `cart_item` - At most one open cart per user
//! - `shipping_address` - Address book, one default per user
//! - `customer_order`, `order_item`, `order_shipping_address` - Immutable order snapshots
//! - `stock_movement` - Journal of every ledger adjustment
//! - `payment`, `payment_event` - Provider state and webhook replay guard
//! - `review` - Product reviews
//!
//! Functions take `&mut PgConnection` so callers decide the transaction
//! boundary: pass `&mut *tx` inside a transaction or `&mut *pool.acquire().await?`
//! for a one-off read.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p cartwright-cli -- migrate
//! ```

pub mod addresses;
pub mod carts;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate review).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map unique and foreign-key violations to [`RepositoryError::Conflict`].
pub(crate) fn map_constraint(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

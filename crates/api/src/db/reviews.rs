//! Review persistence and the purchase lookup behind verification.

use cartwright_core::rules::review::completed_purchase_statuses;
use cartwright_core::{ProductId, ReviewId, UserId};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use super::{RepositoryError, map_constraint};
use crate::models::{NewReview, Review};

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    user_id: UserId,
    product_id: ProductId,
    rating: i16,
    title: Option<String>,
    comment: String,
    is_approved: bool,
    verified_purchase: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            is_approved: row.is_approved,
            verified_purchase: row.verified_purchase,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const REVIEW_COLUMNS: &str = "id, user_id, product_id, rating, title, comment, \
                              is_approved, verified_purchase, created_at, updated_at";

/// Whether `user_id` has a completed order containing any variant of
/// `product_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn has_completed_purchase(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let exists: bool = sqlx::query_scalar(
        r"
        SELECT EXISTS (
            SELECT 1
            FROM customer_order o
            JOIN order_item oi ON oi.order_id = o.id
            JOIN product_variant v ON v.id = oi.variant_id
            WHERE o.user_id = $1
              AND v.product_id = $2
              AND o.status::TEXT = ANY($3)
        )
        ",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(completed_purchase_statuses())
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Whether a product exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn product_exists(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM product WHERE id = $1)")
        .bind(product_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Insert a review.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the user already reviewed the product.
/// Returns `RepositoryError::Database` for other database errors.
pub async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    review: &NewReview,
    verified_purchase: bool,
) -> Result<Review, RepositoryError> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        r"
        INSERT INTO review (user_id, product_id, rating, title, comment, verified_purchase)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {REVIEW_COLUMNS}
        "
    ))
    .bind(user_id)
    .bind(review.product_id)
    .bind(review.rating)
    .bind(&review.title)
    .bind(&review.comment)
    .bind(verified_purchase)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_constraint(e, "product already reviewed"))?;

    Ok(row.into())
}

/// Lock a review owned by `user_id`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
    id: ReviewId,
) -> Result<Option<Review>, RepositoryError> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM review WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Review::from))
}

/// Write a review's editable content.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the review does not exist.
/// Returns `RepositoryError::Database` if the query fails.
pub async fn update_content(
    conn: &mut PgConnection,
    id: ReviewId,
    rating: i16,
    title: Option<&str>,
    comment: &str,
) -> Result<Review, RepositoryError> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        r"
        UPDATE review
        SET rating = $2, title = $3, comment = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {REVIEW_COLUMNS}
        "
    ))
    .bind(id)
    .bind(rating)
    .bind(title)
    .bind(comment)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

/// Set the verified-purchase flag.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn set_verified(
    conn: &mut PgConnection,
    id: ReviewId,
    verified: bool,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE review SET verified_purchase = $2 WHERE id = $1")
        .bind(id)
        .bind(verified)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// List a user's reviews, newest first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_for_user(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<Review>, RepositoryError> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM review WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Review::from).collect())
}

//! Reviews with a live verified-purchase flag.
//!
//! The flag is recomputed on every save from the author's orders in a
//! completed-purchase status, so it can turn off again after a refund.

use cartwright_core::rules::review::{is_valid_rating, verification_change};
use cartwright_core::{ReviewId, UserId};
use sqlx::PgPool;
use tracing::{info, instrument};

use super::OrderError;
use crate::db::reviews;
use crate::models::{NewReview, Review, ReviewUpdate};

/// Review service.
pub struct ReviewService {
    pool: PgPool,
}

impl ReviewService {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns error if the database query fails.
    pub async fn list_mine(&self, user_id: UserId) -> Result<Vec<Review>, OrderError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reviews::list_for_user(&mut conn, user_id).await?)
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::BadRequest` for an invalid rating or blank comment,
    /// `OrderError::NotFound` for an unknown product, and
    /// `OrderError::Conflict` if the caller already reviewed it.
    #[instrument(skip(self, review), fields(user_id = %user_id, product_id = %review.product_id))]
    pub async fn create(&self, user_id: UserId, review: &NewReview) -> Result<Review, OrderError> {
        validate(review.rating, &review.comment)?;

        let mut tx = self.pool.begin().await?;

        if !reviews::product_exists(&mut tx, review.product_id).await? {
            return Err(OrderError::NotFound("product"));
        }

        let verified = reviews::has_completed_purchase(&mut tx, user_id, review.product_id).await?;
        let saved = reviews::insert(&mut tx, user_id, review, verified).await?;
        tx.commit().await?;

        info!(review_id = %saved.id, verified_purchase = verified, "Review created");
        Ok(saved)
    }

    /// Edit the caller's review and refresh its verified flag.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the review is not the caller's and
    /// `OrderError::BadRequest` for an invalid rating or blank comment.
    #[instrument(skip(self, update), fields(user_id = %user_id, review_id = %id))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: ReviewId,
        update: &ReviewUpdate,
    ) -> Result<Review, OrderError> {
        let mut tx = self.pool.begin().await?;

        let current = reviews::lock_for_user(&mut tx, user_id, id)
            .await?
            .ok_or(OrderError::NotFound("review"))?;

        let rating = update.rating.unwrap_or(current.rating);
        let comment = update.comment.as_deref().unwrap_or(&current.comment);
        let title = update.title.as_deref().or(current.title.as_deref());
        validate(rating, comment)?;

        let mut saved = reviews::update_content(&mut tx, id, rating, title, comment).await?;

        let purchased = reviews::has_completed_purchase(&mut tx, user_id, saved.product_id).await?;
        if let Some(verified) = verification_change(saved.verified_purchase, purchased) {
            reviews::set_verified(&mut tx, id, verified).await?;
            saved.verified_purchase = verified;
            info!(verified_purchase = verified, "Review verification changed");
        }

        tx.commit().await?;
        Ok(saved)
    }
}

fn validate(rating: i16, comment: &str) -> Result<(), OrderError> {
    if !is_valid_rating(rating) {
        return Err(OrderError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    if comment.trim().is_empty() {
        return Err(OrderError::BadRequest("comment is required".to_string()));
    }
    Ok(())
}

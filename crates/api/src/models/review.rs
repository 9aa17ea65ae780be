//! Product reviews.

use cartwright_core::{ProductId, ReviewId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product review.
#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub rating: i16,
    pub title: Option<String>,
    pub comment: String,
    pub is_approved: bool,
    /// Derived from the author's completed orders; recomputed on every save.
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a review.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub product_id: ProductId,
    pub rating: i16,
    pub title: Option<String>,
    pub comment: String,
}

/// Request body for editing a review. Omitted fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewUpdate {
    pub rating: Option<i16>,
    pub title: Option<String>,
    pub comment: Option<String>,
}

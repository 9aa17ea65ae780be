//! Review route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use cartwright_core::ReviewId;

use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::{NewReview, Review, ReviewUpdate};
use crate::services::ReviewService;
use crate::state::AppState;

/// `GET /reviews` - the caller's own reviews.
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Review>>> {
    let reviews = ReviewService::new(state.pool().clone())
        .list_mine(user.id)
        .await?;
    Ok(Json(reviews))
}

/// `POST /reviews`
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = ReviewService::new(state.pool().clone())
        .create(user.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// `PATCH /reviews/{id}`
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ReviewId>,
    Json(body): Json<ReviewUpdate>,
) -> Result<Json<Review>> {
    let review = ReviewService::new(state.pool().clone())
        .update(user.id, id, &body)
        .await?;
    Ok(Json(review))
}

//! Local projection of an externally issued user.

use cartwright_core::UserId;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
}

//! Read access to the local user projection.

use cartwright_core::UserId;
use sqlx::PgConnection;

use super::RepositoryError;
use crate::models::User;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    username: String,
}

/// Get a user by id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_user(
    conn: &mut PgConnection,
    id: UserId,
) -> Result<Option<User>, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>("SELECT id, email, username FROM app_user WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| User {
        id: r.id,
        email: r.email,
        username: r.username,
    }))
}

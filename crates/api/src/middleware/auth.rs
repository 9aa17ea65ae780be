//! Caller identity extractors.
//!
//! Identity is established upstream by the identity gateway, which forwards
//! the authenticated user as `X-User-Id` and staff as `X-User-Role: staff`.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use cartwright_core::UserId;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub is_staff: bool,
}

/// Extractor that requires an authenticated caller.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, user {}!", user.id)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

/// Extractor that requires a staff caller.
pub struct RequireStaff(pub CurrentUser);

/// Error returned when the caller cannot be identified or lacks the role.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// Missing or malformed identity header.
    Unauthorized,
    /// Authenticated but not staff.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                axum::Json(serde_json::json!({ "error": "Authentication required" })),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                axum::Json(serde_json::json!({ "error": "Staff access required" })),
            )
                .into_response(),
        }
    }
}

fn current_user(parts: &Parts) -> Result<CurrentUser, AuthRejection> {
    let id = parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<UserId>().ok())
        .filter(|id| id.as_i32() > 0)
        .ok_or(AuthRejection::Unauthorized)?;

    let is_staff = parts
        .headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|role| role.trim().eq_ignore_ascii_case("staff"));

    Ok(CurrentUser { id, is_staff })
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts).map(Self)
    }
}

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts)?;
        if user.is_staff {
            Ok(Self(user))
        } else {
            Err(AuthRejection::Forbidden)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/orders");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_require_user() {
        let mut p = parts(&[("X-User-Id", "12")]);
        let RequireUser(user) = RequireUser::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(user.id, UserId::new(12));
        assert!(!user.is_staff);
    }

    #[tokio::test]
    async fn test_missing_or_bad_id_is_unauthorized() {
        for headers in [vec![], vec![("X-User-Id", "abc")], vec![("X-User-Id", "0")]] {
            let mut p = parts(&headers);
            let result = RequireUser::from_request_parts(&mut p, &()).await;
            assert_eq!(result.err(), Some(AuthRejection::Unauthorized));
        }
    }

    #[tokio::test]
    async fn test_require_staff() {
        let mut p = parts(&[("X-User-Id", "3"), ("X-User-Role", "Staff")]);
        let RequireStaff(user) = RequireStaff::from_request_parts(&mut p, &()).await.unwrap();
        assert!(user.is_staff);

        let mut p = parts(&[("X-User-Id", "3")]);
        let result = RequireStaff::from_request_parts(&mut p, &()).await;
        assert_eq!(result.err(), Some(AuthRejection::Forbidden));
    }
}

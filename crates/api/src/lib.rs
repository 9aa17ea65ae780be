//! Cartwright order fulfillment API.
//!
//! REST backend that turns carts into orders, collects payment through a
//! hosted checkout provider, and keeps the inventory ledger consistent with
//! every order change.
//!
//! # Architecture
//!
//! - Axum handlers in [`routes`] authenticate the caller and delegate to
//!   [`services`]
//! - Services own transactions; [`db`] holds the queries they run
//! - Pure rules (ledger math, totals, transitions) live in `cartwright-core`
//! - [`payments`] wraps the provider API and webhook verification

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router with all routes and shared layers.
///
/// Sentry layers are added by the binary so tests can drive the router
/// without a Sentry client.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use cartwright_core::CurrencyCode;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{ApiConfig, PaymentConfig};

    fn test_app() -> Router {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost/cartwright_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            public_url: "http://localhost:3000".to_string(),
            payment: PaymentConfig {
                secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
                webhook_secret: SecretString::from("whsec_aB3xY9mK2nL5pQ7rT0uW4zC6"),
                api_base: "http://127.0.0.1:9/v1".to_string(),
                currency: CurrencyCode::USD,
                timeout: Duration::from_secs(1),
                webhook_tolerance_secs: 300,
            },
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };
        // Never connects unless a handler touches the database
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/cartwright_test")
            .unwrap();
        app(AppState::new(config, pool).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cart_requires_user() {
        let response = test_app()
            .oneshot(Request::get("/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_change_requires_staff() {
        let response = test_app()
            .oneshot(
                Request::patch("/orders/1/status")
                    .header("x-user-id", "7")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"status":"shipped"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let response = test_app()
            .oneshot(
                Request::post("/webhooks/payments")
                    .header("stripe-signature", "t=1,v1=deadbeef")
                    .body(Body::from(r#"{"id":"evt_1","type":"checkout.session.completed"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_rejects_missing_signature() {
        let response = test_app()
            .oneshot(
                Request::post("/webhooks/payments")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

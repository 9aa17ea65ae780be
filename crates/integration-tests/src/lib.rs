//! Integration tests for Cartwright.
//!
//! # Running Tests
//!
//! ```bash
//! export DATABASE_URL=postgres://localhost/cartwright_test
//! cargo test -p cartwright-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own user, products, and variants, so tests can run
//! in parallel against one database.

use std::time::Duration;

use cartwright_api::config::{ApiConfig, PaymentConfig};
use cartwright_api::models::Order;
use cartwright_api::payments::PaymentClient;
use cartwright_api::services::{CartService, CheckoutRequest, CheckoutService, PaymentService};
use cartwright_core::{AddressId, CurrencyCode, Money, ProductId, UserId, VariantId};
use secrecy::SecretString;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

/// Webhook secret used by [`test_config`].
pub const WEBHOOK_SECRET: &str = "whsec_aB3xY9mK2nL5pQ7rT0uW4zC6";

/// Connect to `DATABASE_URL` and apply migrations.
///
/// # Panics
///
/// Panics if `DATABASE_URL` is unset or the database is unreachable.
#[allow(clippy::expect_used)]
pub async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("../api/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

/// Configuration pointing the payment client at an unroutable address.
///
/// Every session request fails, which drives the provider-failure path
/// deterministically. Successful sessions are simulated by writing the
/// session id directly.
#[must_use]
pub fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port: 3000,
        public_url: "http://localhost:3000".to_string(),
        payment: PaymentConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
            api_base: "http://127.0.0.1:9/v1".to_string(),
            currency: CurrencyCode::USD,
            timeout: Duration::from_secs(1),
            webhook_tolerance_secs: 300,
        },
        email: None,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Shared handles for driving services.
pub struct TestContext {
    pub pool: PgPool,
    pub config: ApiConfig,
    pub client: PaymentClient,
}

impl TestContext {
    pub async fn new() -> Self {
        let config = test_config();
        let client = PaymentClient::new(&config.payment);
        Self {
            pool: test_pool().await,
            config,
            client,
        }
    }

    #[must_use]
    pub fn payments(&self) -> PaymentService<'_> {
        PaymentService::new(&self.pool, &self.client, &self.config, None)
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(&self.pool, self.payments())
    }

    /// Fill a fresh cart for `user` and check it out without payment.
    ///
    /// # Panics
    ///
    /// Panics if any step fails.
    #[allow(clippy::expect_used)]
    pub async fn place_order(&self, user: UserId, lines: &[(VariantId, i32)]) -> Order {
        let carts = CartService::new(self.pool.clone());
        let mut cart_id = None;
        for (variant, quantity) in lines {
            let item = carts
                .add_item(user, *variant, *quantity)
                .await
                .expect("add to cart");
            cart_id = Some(item.cart_id);
        }

        let request = CheckoutRequest {
            cart_id: cart_id.expect("at least one line"),
            shipping_address_id: create_address(&self.pool, user).await,
            payment_method: None,
        };
        self.checkout()
            .checkout(user, &request)
            .await
            .expect("checkout")
            .order
    }
}

/// Insert a user with a unique email.
///
/// # Panics
///
/// Panics on database errors.
#[allow(clippy::expect_used)]
pub async fn create_user(pool: &PgPool) -> UserId {
    let tag = Uuid::new_v4().simple().to_string();
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO app_user (email, username) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("{tag}@cartwright.test"))
    .bind(tag)
    .fetch_one(pool)
    .await
    .expect("insert user");
    UserId::new(id)
}

/// Insert a product with one variant.
///
/// # Panics
///
/// Panics on database errors.
#[allow(clippy::expect_used)]
pub async fn create_variant(pool: &PgPool, price: Money, stock: i32) -> (ProductId, VariantId) {
    let product: i32 =
        sqlx::query_scalar("INSERT INTO product (title) VALUES ('Wool Overshirt') RETURNING id")
            .fetch_one(pool)
            .await
            .expect("insert product");

    let variant: i32 = sqlx::query_scalar(
        r"
        INSERT INTO product_variant (product_id, sku, size, color, price, stock)
        VALUES ($1, $2, 'M', 'Olive', $3, $4)
        RETURNING id
        ",
    )
    .bind(product)
    .bind(format!("SKU-{}", Uuid::new_v4().simple()))
    .bind(price.amount())
    .bind(stock)
    .fetch_one(pool)
    .await
    .expect("insert variant");

    (ProductId::new(product), VariantId::new(variant))
}

/// Insert a shipping address for `user`.
///
/// # Panics
///
/// Panics on database errors.
#[allow(clippy::expect_used)]
pub async fn create_address(pool: &PgPool, user: UserId) -> AddressId {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO shipping_address
            (user_id, full_name, address_line_1, city, postal_code, country)
        VALUES ($1, 'Test Customer', '1 Market Street', 'San Francisco', '94105', 'US')
        RETURNING id
        ",
    )
    .bind(user.as_i32())
    .fetch_one(pool)
    .await
    .expect("insert address");
    AddressId::new(id)
}

/// Current stock of a variant.
///
/// # Panics
///
/// Panics on database errors.
#[allow(clippy::expect_used)]
pub async fn stock_of(pool: &PgPool, variant: VariantId) -> i32 {
    sqlx::query_scalar("SELECT stock FROM product_variant WHERE id = $1")
        .bind(variant.as_i32())
        .fetch_one(pool)
        .await
        .expect("read stock")
}

/// Number of orders placed by `user`.
///
/// # Panics
///
/// Panics on database errors.
#[allow(clippy::expect_used)]
pub async fn order_count(pool: &PgPool, user: UserId) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM customer_order WHERE user_id = $1")
        .bind(user.as_i32())
        .fetch_one(pool)
        .await
        .expect("count orders")
}

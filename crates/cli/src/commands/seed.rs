//! Seed the database with a small demo catalog.
//!
//! Safe to run repeatedly: rows are matched on their natural keys (product
//! title, variant SKU, user email) and existing rows are left untouched.

use cartwright_core::Money;
use secrecy::ExposeSecret;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use super::{CommandError, database_url};

struct SeedVariant {
    sku: &'static str,
    size: Option<&'static str>,
    color: Option<&'static str>,
    price_cents: i64,
    stock: i32,
}

struct SeedProduct {
    title: &'static str,
    variants: &'static [SeedVariant],
}

const CATALOG: &[SeedProduct] = &[
    SeedProduct {
        title: "Canvas Tote",
        variants: &[
            SeedVariant {
                sku: "TOTE-NAT",
                size: None,
                color: Some("Natural"),
                price_cents: 2_400,
                stock: 40,
            },
            SeedVariant {
                sku: "TOTE-BLK",
                size: None,
                color: Some("Black"),
                price_cents: 2_400,
                stock: 25,
            },
        ],
    },
    SeedProduct {
        title: "Wool Overshirt",
        variants: &[
            SeedVariant {
                sku: "OVR-S-OLV",
                size: Some("S"),
                color: Some("Olive"),
                price_cents: 100_000,
                stock: 10,
            },
            SeedVariant {
                sku: "OVR-M-OLV",
                size: Some("M"),
                color: Some("Olive"),
                price_cents: 100_000,
                stock: 10,
            },
            SeedVariant {
                sku: "OVR-L-NVY",
                size: Some("L"),
                color: Some("Navy"),
                price_cents: 80_000,
                stock: 6,
            },
        ],
    },
    SeedProduct {
        title: "Enamel Mug",
        variants: &[SeedVariant {
            sku: "MUG-WHT",
            size: None,
            color: Some("White"),
            price_cents: 1_500,
            stock: 100,
        }],
    },
];

const DEMO_EMAIL: &str = "demo@cartwright.test";
const DEMO_USERNAME: &str = "demo";

/// Seed the demo catalog, a demo user, and the user's default address.
///
/// # Errors
///
/// Returns an error if the database URL is missing or a query fails.
pub async fn demo_data() -> Result<(), CommandError> {
    let database_url = database_url()?;
    let pool = PgPool::connect(database_url.expose_secret()).await?;
    let mut tx = pool.begin().await?;

    let mut variants_inserted = 0;
    for product in CATALOG {
        let product_id = upsert_product(&mut tx, product.title).await?;
        for variant in product.variants {
            if insert_variant(&mut tx, product_id, variant).await? {
                variants_inserted += 1;
            }
        }
    }

    let user_id = upsert_user(&mut tx).await?;
    let address_added = ensure_default_address(&mut tx, user_id).await?;

    tx.commit().await?;

    info!("Seeding complete!");
    info!("  Products: {}", CATALOG.len());
    info!("  Variants inserted: {variants_inserted}");
    info!("  Demo user: {DEMO_EMAIL} (id {user_id})");
    info!("  Default address added: {address_added}");
    Ok(())
}

async fn upsert_product(conn: &mut PgConnection, title: &str) -> Result<i32, sqlx::Error> {
    let existing: Option<i32> = sqlx::query_scalar("SELECT id FROM product WHERE title = $1")
        .bind(title)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(id) => Ok(id),
        None => {
            sqlx::query_scalar("INSERT INTO product (title) VALUES ($1) RETURNING id")
                .bind(title)
                .fetch_one(&mut *conn)
                .await
        }
    }
}

/// Returns `true` if the variant was new.
async fn insert_variant(
    conn: &mut PgConnection,
    product_id: i32,
    variant: &SeedVariant,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        INSERT INTO product_variant (product_id, sku, size, color, price, stock)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (sku) DO NOTHING
        ",
    )
    .bind(product_id)
    .bind(variant.sku)
    .bind(variant.size)
    .bind(variant.color)
    .bind(Money::from_cents(variant.price_cents).amount())
    .bind(variant.stock)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

async fn upsert_user(conn: &mut PgConnection) -> Result<i32, sqlx::Error> {
    // DO UPDATE so RETURNING yields the id on conflict too
    sqlx::query_scalar(
        r"
        INSERT INTO app_user (email, username)
        VALUES ($1, $2)
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id
        ",
    )
    .bind(DEMO_EMAIL)
    .bind(DEMO_USERNAME)
    .fetch_one(&mut *conn)
    .await
}

/// Returns `true` if an address was added.
async fn ensure_default_address(conn: &mut PgConnection, user_id: i32) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        INSERT INTO shipping_address
            (user_id, full_name, address_line_1, city, state, postal_code, country, is_default)
        SELECT $1, 'Demo Customer', '1 Market Street', 'San Francisco', 'CA', '94105', 'US', TRUE
        WHERE NOT EXISTS (SELECT 1 FROM shipping_address WHERE user_id = $1)
        ",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

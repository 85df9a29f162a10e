use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

use crate::database_ops::db::Db;

/// A tracked product. `price` mirrors the most recent history entry and is
/// NULL until the first successful scrape.
#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub price: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UpsertOutcome {
    pub id: i64,
    pub inserted: bool,
    pub renamed: bool,
}

/// Upsert a product keyed by url. Idempotent: an unchanged (name, url) pair
/// touches nothing, so reruns with the same catalog rewrite no rows.
#[instrument(skip(db))]
pub async fn upsert_product(db: &Db, name: &str, url: &str) -> Result<UpsertOutcome> {
    // The WHERE clause turns a no-op conflict into "no row returned"; `xmax = 0`
    // distinguishes a fresh insert from a rename of an existing row.
    let row: Option<(i64, bool)> = sqlx::query_as(
        "INSERT INTO products (name, url) VALUES ($1, $2)
         ON CONFLICT (url) DO UPDATE SET name = EXCLUDED.name
         WHERE products.name IS DISTINCT FROM EXCLUDED.name
         RETURNING id, (xmax = 0) AS inserted",
    )
    .bind(name)
    .bind(url)
    .fetch_optional(&db.pool)
    .await?;

    match row {
        Some((id, inserted)) => Ok(UpsertOutcome {
            id,
            inserted,
            renamed: !inserted,
        }),
        None => {
            let id: i64 = sqlx::query_scalar("SELECT id FROM products WHERE url = $1")
                .bind(url)
                .fetch_one(&db.pool)
                .await?;
            Ok(UpsertOutcome {
                id,
                inserted: false,
                renamed: false,
            })
        }
    }
}

/// All tracked products, ordered by name.
pub async fn all_products(db: &Db) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT id, name, url, price, created_at, updated_at FROM products ORDER BY name",
    )
    .fetch_all(&db.pool)
    .await?;
    Ok(products)
}

pub async fn product_by_id(db: &Db, id: i64) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT id, name, url, price, created_at, updated_at FROM products WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&db.pool)
    .await?;
    Ok(product)
}

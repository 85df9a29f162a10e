use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::{debug, instrument};

use crate::database_ops::db::Db;

/// One observed price. Append-only; immutable once written.
#[derive(Debug, Clone, FromRow)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub product_id: i64,
    pub price: BigDecimal,
    pub scraped_at: DateTime<Utc>,
}

/// Price of the most recent history entry for a product, if any.
pub async fn latest_price(db: &Db, product_id: i64) -> Result<Option<BigDecimal>> {
    let price: Option<BigDecimal> = sqlx::query_scalar(
        "SELECT price FROM price_history
         WHERE product_id = $1
         ORDER BY scraped_at DESC, id DESC
         LIMIT 1",
    )
    .bind(product_id)
    .fetch_optional(&db.pool)
    .await?;
    Ok(price)
}

/// Record one observation: append the history row and refresh the product's
/// cached price in a single transaction, so the two can never diverge.
#[instrument(skip(db, price))]
pub async fn record_price(db: &Db, product_id: i64, price: &BigDecimal) -> Result<()> {
    let mut tx = db.pool.begin().await?;
    sqlx::query("INSERT INTO price_history (product_id, price) VALUES ($1, $2)")
        .bind(product_id)
        .bind(price)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE products SET price = $2 WHERE id = $1")
        .bind(product_id)
        .bind(price)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    debug!(product_id, price = %price, "recorded price");
    Ok(())
}

/// Full history for a product, chronologically ascending.
pub async fn history_for_product(db: &Db, product_id: i64) -> Result<Vec<PriceHistoryEntry>> {
    let entries = sqlx::query_as::<_, PriceHistoryEntry>(
        "SELECT id, product_id, price, scraped_at FROM price_history
         WHERE product_id = $1
         ORDER BY scraped_at ASC, id ASC",
    )
    .bind(product_id)
    .fetch_all(&db.pool)
    .await?;
    Ok(entries)
}

// API response models (DTOs)

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::compare::Direction;

/// One row of the latest-two-observations window query behind `/items`.
/// `rn` is 1 for the newest observation, 2 for the one before it.
#[derive(Debug, FromRow)]
pub struct LatestPriceRow {
    pub product_id: i64,
    pub name: String,
    pub price: BigDecimal,
    pub scraped_at: DateTime<Utc>,
    pub rn: i64,
}

#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub id: i64,
    pub product_name: String,
    pub store: String,
    pub current_price: f64,
    pub previous_price: Option<f64>,
    pub price_change: f64,
    pub percent_change: Option<f64>,
    pub direction: Direction,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PricePoint {
    pub price: f64,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ItemHistoryResponse {
    pub id: i64,
    pub product_name: String,
    pub store: String,
    pub history: Vec<PricePoint>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

fn to_f64(price: &BigDecimal) -> f64 {
    price.to_f64().unwrap_or(0.0)
}

/// Fold the window-query rows (ordered by product, then rn) into summaries.
/// Products with no history never appear in the input and so are omitted.
pub fn fold_item_summaries(rows: &[LatestPriceRow], store: &str) -> Vec<ItemSummary> {
    let mut items: Vec<ItemSummary> = Vec::new();
    let mut idx = 0usize;
    while idx < rows.len() {
        let latest = &rows[idx];
        let previous = rows
            .get(idx + 1)
            .filter(|r| r.product_id == latest.product_id);
        idx += if previous.is_some() { 2 } else { 1 };

        let current_price = to_f64(&latest.price);
        let previous_price = previous.map(|r| to_f64(&r.price));
        let price_change = previous_price.map(|p| current_price - p).unwrap_or(0.0);
        let percent_change = previous_price
            .filter(|p| *p != 0.0)
            .map(|p| price_change / p * 100.0);

        items.push(ItemSummary {
            id: latest.product_id,
            product_name: latest.name.clone(),
            store: store.to_string(),
            current_price,
            previous_price,
            price_change,
            percent_change,
            direction: Direction::between(previous.map(|r| &r.price), &latest.price),
            last_updated: latest.scraped_at,
        });
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn row(product_id: i64, name: &str, price: &str, rn: i64, ts: &str) -> LatestPriceRow {
        LatestPriceRow {
            product_id,
            name: name.to_string(),
            price: BigDecimal::from_str(price).unwrap(),
            scraped_at: ts.parse().unwrap(),
            rn,
        }
    }

    #[test]
    fn folds_latest_two_rows_per_product() {
        let rows = vec![
            row(1, "Eggs", "12.50", 1, "2026-08-06T01:00:00Z"),
            row(1, "Eggs", "12.00", 2, "2026-08-05T01:00:00Z"),
            row(2, "Milk 1L", "7.45", 1, "2026-08-06T01:00:00Z"),
        ];
        let items = fold_item_summaries(&rows, "JayaGrocer");
        assert_eq!(items.len(), 2);

        let eggs = &items[0];
        assert_eq!(eggs.id, 1);
        assert_eq!(eggs.store, "JayaGrocer");
        assert!((eggs.current_price - 12.50).abs() < 1e-9);
        assert_eq!(eggs.previous_price, Some(12.00));
        assert!((eggs.price_change - 0.50).abs() < 1e-9);
        let pct = eggs.percent_change.unwrap();
        assert!((pct - 4.1666).abs() < 1e-3);
        assert_eq!(eggs.direction, Direction::Up);

        let milk = &items[1];
        assert_eq!(milk.previous_price, None);
        assert_eq!(milk.price_change, 0.0);
        assert!(milk.percent_change.is_none());
        assert_eq!(milk.direction, Direction::New);
    }

    #[test]
    fn zero_previous_price_yields_null_percent() {
        let rows = vec![
            row(3, "Promo item", "1.00", 1, "2026-08-06T01:00:00Z"),
            row(3, "Promo item", "0.00", 2, "2026-08-05T01:00:00Z"),
        ];
        let items = fold_item_summaries(&rows, "JayaGrocer");
        assert_eq!(items.len(), 1);
        assert!(items[0].percent_change.is_none());
        assert_eq!(items[0].direction, Direction::Up);
    }

    #[test]
    fn single_observation_product_is_new() {
        let rows = vec![row(9, "Butter", "9.90", 1, "2026-08-06T01:00:00Z")];
        let items = fold_item_summaries(&rows, "JayaGrocer");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].direction, Direction::New);
    }
}

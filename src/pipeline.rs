//! The daily batch run: sync catalog -> scrape -> compare -> persist -> notify.
//!
//! Per-item failures (scrape, persist, notify) are logged with their url and
//! stage, counted, and never stop the batch. Only catalog-level or
//! store-connection-level failures abort the run.

use anyhow::{Context, Result};
use futures::{stream, StreamExt};
use tracing::{error, info, warn};

use crate::catalog::CatalogRow;
use crate::compare::{classify, Direction};
use crate::database_ops::db::Db;
use crate::database_ops::{history, products};
use crate::notify::TelegramNotifier;
use crate::scrape::Scraper;
use crate::util::env::env_parse;

#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineOptions {
    /// Minimum relative change (fraction) that triggers a notification.
    pub min_pct_change: f64,
    /// Bounded fan-out for the check stage.
    pub concurrency: usize,
}

impl PipelineOptions {
    pub fn from_env() -> Self {
        Self {
            min_pct_change: env_parse("MIN_PCT_CHANGE", 0.01f64),
            concurrency: env_parse("SCRAPE_CONCURRENCY", 4usize).max(1),
        }
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub synced: usize,
    pub skipped_rows: usize,
    pub new_products: usize,
    pub renamed: usize,
    pub checked: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub scrape_errors: usize,
    pub persist_errors: usize,
    pub notify_errors: usize,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }
}

/// Outcome of one product's check chain, folded into the run summary.
#[derive(Debug)]
enum ItemOutcome {
    Recorded {
        direction: Direction,
        notify_failed: bool,
    },
    ScrapeFailed,
    PersistFailed,
}

/// Sync catalog rows into the products table, in catalog order. Row-level
/// upsert failures are logged and counted; a non-empty catalog that syncs
/// nothing at all means the store itself is down, which is fatal.
pub async fn sync_catalog(db: &Db, rows: &[CatalogRow], summary: &mut RunSummary) -> Result<()> {
    info!(rows = rows.len(), "syncing catalog");
    for row in rows {
        match products::upsert_product(db, &row.name, &row.url).await {
            Ok(outcome) => {
                summary.synced += 1;
                if outcome.inserted {
                    summary.new_products += 1;
                    info!(name = %row.name, url = %row.url, "added new product");
                } else if outcome.renamed {
                    summary.renamed += 1;
                    info!(name = %row.name, url = %row.url, "updated product name");
                }
            }
            Err(err) => {
                error!(name = %row.name, url = %row.url, error = %err, "product upsert failed");
                summary.skipped_rows += 1;
            }
        }
    }
    if !rows.is_empty() && summary.synced == 0 {
        anyhow::bail!("catalog sync wrote no rows; store unreachable?");
    }
    info!(
        synced = summary.synced,
        new = summary.new_products,
        renamed = summary.renamed,
        skipped = summary.skipped_rows,
        "catalog sync complete"
    );
    Ok(())
}

/// Scrape, classify, persist, and (when notable) notify for every tracked
/// product, with bounded concurrency across products. Each product's own
/// chain runs sequentially, so its history rows land in scrape order.
pub async fn check_prices(
    db: &Db,
    scraper: &Scraper,
    notifier: &TelegramNotifier,
    opts: &PipelineOptions,
    summary: &mut RunSummary,
) -> Result<()> {
    let all = products::all_products(db)
        .await
        .context("failed to list products")?;
    if all.is_empty() {
        warn!("no products found in database");
        return Ok(());
    }
    info!(products = all.len(), concurrency = opts.concurrency, "checking prices");

    let outcomes: Vec<ItemOutcome> = stream::iter(all)
        .map(|product| check_one(db, scraper, notifier, opts.min_pct_change, product))
        .buffer_unordered(opts.concurrency)
        .collect()
        .await;

    for outcome in outcomes {
        match outcome {
            ItemOutcome::Recorded {
                direction,
                notify_failed,
            } => {
                summary.checked += 1;
                match direction {
                    Direction::Unchanged => summary.unchanged += 1,
                    _ => summary.changed += 1,
                }
                if notify_failed {
                    summary.notify_errors += 1;
                }
            }
            ItemOutcome::ScrapeFailed => summary.scrape_errors += 1,
            ItemOutcome::PersistFailed => summary.persist_errors += 1,
        }
    }
    Ok(())
}

async fn check_one(
    db: &Db,
    scraper: &Scraper,
    notifier: &TelegramNotifier,
    min_pct_change: f64,
    product: products::Product,
) -> ItemOutcome {
    info!(name = %product.name, "checking price");

    let new_price = match scraper.fetch_price(&product.url).await {
        Ok(price) => price,
        Err(err) => {
            warn!(name = %product.name, url = %product.url, error = %err, "scrape failed; skipping item");
            return ItemOutcome::ScrapeFailed;
        }
    };

    let previous = match history::latest_price(db, product.id).await {
        Ok(prev) => prev,
        Err(err) => {
            error!(name = %product.name, url = %product.url, error = %err, "latest-price lookup failed; skipping item");
            return ItemOutcome::PersistFailed;
        }
    };

    let change = classify(previous.as_ref(), &new_price, min_pct_change);

    // Every scrape is recorded, changed or not.
    if let Err(err) = history::record_price(db, product.id, &new_price).await {
        error!(name = %product.name, url = %product.url, error = %err, "failed to record price");
        return ItemOutcome::PersistFailed;
    }

    match change.direction {
        Direction::New => {
            info!(name = %product.name, price = %new_price, "first price recorded");
        }
        Direction::Up | Direction::Down => {
            info!(
                name = %product.name,
                old = ?change.previous,
                new = %change.current,
                pct = ?change.pct,
                direction = %change.direction,
                "price changed"
            );
        }
        Direction::Unchanged => {
            info!(name = %product.name, price = %new_price, "no significant change");
        }
    }

    let mut notify_failed = false;
    if change.should_notify() {
        let sent = match change.direction {
            Direction::New => notifier.notify_new(&product.name, &product.url, &new_price).await,
            _ => notifier.notify_change(&product.name, &product.url, &change).await,
        };
        if let Err(err) = sent {
            warn!(name = %product.name, error = %err, "notification failed");
            notify_failed = true;
        }
    }

    ItemOutcome::Recorded {
        direction: change.direction,
        notify_failed,
    }
}

/// The full monitoring cycle: catalog sync, then the price check.
pub async fn run(
    db: &Db,
    catalog_rows: &[CatalogRow],
    catalog_skipped: usize,
    scraper: &Scraper,
    notifier: &TelegramNotifier,
    opts: &PipelineOptions,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new();
    summary.skipped_rows = catalog_skipped;
    info!(run_id = %summary.run_id, "starting monitoring cycle");

    sync_catalog(db, catalog_rows, &mut summary).await?;
    check_prices(db, scraper, notifier, opts, &mut summary).await?;

    info!(
        run_id = %summary.run_id,
        checked = summary.checked,
        changed = summary.changed,
        unchanged = summary.unchanged,
        scrape_errors = summary.scrape_errors,
        persist_errors = summary.persist_errors,
        notify_errors = summary.notify_errors,
        "monitoring cycle complete"
    );
    Ok(summary)
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grocery_sentinel::catalog;
use grocery_sentinel::database_ops::db::Db;
use grocery_sentinel::notify::TelegramNotifier;
use grocery_sentinel::pipeline::{self, PipelineOptions, RunSummary};
use grocery_sentinel::scrape::Scraper;
use grocery_sentinel::util::env as env_util;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sentinel", version, about = "Grocery price sentinel batch runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Full monitoring cycle: sync the catalog, then check all prices (the daily batch)
    Run {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Sync the product catalog into the database and exit
    Sync {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Check prices for already-synced products without touching the catalog
    Check {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    grocery_sentinel::env_boot::ensure_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { db_url } => {
            let db = connect(db_url).await?;
            let (rows, skipped) = catalog::load_catalog()
                .await
                .context("catalog sync failed")?;
            let scraper = Scraper::from_env()?;
            let notifier = TelegramNotifier::from_env()?;
            let opts = PipelineOptions::from_env();
            let summary = pipeline::run(&db, &rows, skipped, &scraper, &notifier, &opts).await?;
            print_summary(&summary)?;
        }
        Commands::Sync { db_url } => {
            let db = connect(db_url).await?;
            let (rows, skipped) = catalog::load_catalog()
                .await
                .context("catalog sync failed")?;
            let mut summary = RunSummary::new();
            summary.skipped_rows = skipped;
            pipeline::sync_catalog(&db, &rows, &mut summary).await?;
            print_summary(&summary)?;
        }
        Commands::Check { db_url } => {
            let db = connect(db_url).await?;
            let scraper = Scraper::from_env()?;
            let notifier = TelegramNotifier::from_env()?;
            let opts = PipelineOptions::from_env();
            let mut summary = RunSummary::new();
            pipeline::check_prices(&db, &scraper, &notifier, &opts, &mut summary).await?;
            print_summary(&summary)?;
        }
    }

    info!("done");
    Ok(())
}

async fn connect(db_url_flag: Option<String>) -> Result<Db> {
    env_util::preflight_check(
        "sentinel",
        &[],
        &[
            "DATABASE_URL",
            "GOOGLE_SHEETS_ID",
            "GOOGLE_SHEETS_TAB",
            "CATALOG_CSV_PATH",
            "TELEGRAM_CHAT_ID",
            "MIN_PCT_CHANGE",
            "SCRAPE_CONCURRENCY",
            "STORE_NAME",
        ],
    )?;
    let database_url = match db_url_flag {
        Some(url) => url,
        None => env_util::db_url()?,
    };
    let max_conns: u32 = env_util::env_parse("DB_MAX_CONNS", 10u32);
    Db::connect(&database_url, max_conns)
        .await
        .context("Db::connect failed")
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

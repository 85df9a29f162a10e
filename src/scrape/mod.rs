//! Product-page price scraper.
//!
//! Fetches a product page and extracts the displayed price. Extraction walks a
//! ladder of patterns: structured data first (JSON-LD offers, then price meta
//! tags), then the store's visible "RM 12.34" text. Network and HTTP failures
//! are retried with doubling, jittered backoff; extraction failures fail fast
//! since the same HTML would fail again.

use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use bigdecimal::{BigDecimal, Zero};
use rand::Rng;
use regex::Regex;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::util::env::env_parse;

const DEFAULT_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Net(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("no price found on page")]
    PriceNotFound,
    #[error("could not parse price text {0:?}")]
    Parse(String),
}

impl ScrapeError {
    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScrapeError::Net(_) | ScrapeError::Status { .. })
    }
}

#[derive(Clone)]
pub struct Scraper {
    http: Client,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl Scraper {
    pub fn new(timeout_secs: u64, max_attempts: u32, backoff_base_ms: u64) -> anyhow::Result<Self> {
        let ua = crate::util::env::env_opt("SCRAPE_UA").unwrap_or_else(|| DEFAULT_UA.to_string());
        let http = Client::builder()
            .user_agent(ua)
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            max_attempts: max_attempts.max(1),
            backoff_base_ms: backoff_base_ms.max(1),
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(
            env_parse("SCRAPE_TIMEOUT_SECS", 15u64),
            env_parse("SCRAPE_MAX_RETRIES", 2u32),
            env_parse("SCRAPE_BACKOFF_MS", 500u64),
        )
    }

    /// Fetch a product page and extract its current price.
    pub async fn fetch_price(&self, url: &str) -> Result<BigDecimal, ScrapeError> {
        let mut attempt = 0u32;
        let mut delay = Duration::from_millis(self.backoff_base_ms);

        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(price) => {
                    debug!(url, attempt, price = %price, "price extracted");
                    return Ok(price);
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let jitter = rand::thread_rng().gen_range(0..=self.backoff_base_ms / 2);
                    let wait = delay + Duration::from_millis(jitter);
                    warn!(url, attempt, error = %err, wait_ms = wait.as_millis() as u64, "scrape attempt failed; retrying");
                    tokio::time::sleep(wait).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<BigDecimal, ScrapeError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status,
                url: url.to_string(),
            });
        }
        let html = resp.text().await?;
        extract_price(&html)
    }
}

fn json_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""price"\s*:\s*"?([0-9][0-9,]*(?:\.[0-9]+)?)"?"#).expect("valid regex")
    })
}

fn meta_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta[^>]+(?:property|itemprop|name)\s*=\s*["'](?:og:price:amount|product:price:amount|price)["'][^>]*content\s*=\s*["']\s*(?:RM\s*)?([0-9][0-9,]*(?:\.[0-9]+)?)\s*["']"#,
        )
        .expect("valid regex")
    })
}

fn currency_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)RM\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("valid regex"))
}

/// Walk the extraction ladder over raw HTML. First match wins.
pub fn extract_price(html: &str) -> Result<BigDecimal, ScrapeError> {
    for re in [json_price_re(), meta_price_re(), currency_text_re()] {
        if let Some(caps) = re.captures(html) {
            if let Some(m) = caps.get(1) {
                return parse_price_text(m.as_str());
            }
        }
    }
    Err(ScrapeError::PriceNotFound)
}

/// Parse a captured numeric string ("1,234.50") into a positive price.
fn parse_price_text(text: &str) -> Result<BigDecimal, ScrapeError> {
    let cleaned = text.replace(',', "");
    let price =
        BigDecimal::from_str(&cleaned).map_err(|_| ScrapeError::Parse(text.to_string()))?;
    if price <= BigDecimal::zero() {
        return Err(ScrapeError::Parse(text.to_string()));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn extracts_from_json_ld_offers() {
        let html = r#"<script type="application/ld+json">
            {"@type":"Product","offers":{"price":"12.90","priceCurrency":"MYR"}}
        </script>"#;
        assert_eq!(extract_price(html).unwrap(), bd("12.90"));
    }

    #[test]
    fn extracts_from_price_meta_tag() {
        let html = r#"<head><meta property="og:price:amount" content="7.45"></head>"#;
        assert_eq!(extract_price(html).unwrap(), bd("7.45"));
    }

    #[test]
    fn falls_back_to_visible_currency_text() {
        let html = r#"<div class="product-price"><span>RM 10.50</span></div>"#;
        assert_eq!(extract_price(html).unwrap(), bd("10.50"));
    }

    #[test]
    fn structured_data_wins_over_visible_text() {
        let html = r#"
            <meta itemprop="price" content="3.99">
            <span>was RM 5.99</span>
        "#;
        assert_eq!(extract_price(html).unwrap(), bd("3.99"));
    }

    #[test]
    fn strips_thousands_separators() {
        let html = "<p>RM 1,234.50</p>";
        assert_eq!(extract_price(html).unwrap(), bd("1234.50"));
    }

    #[test]
    fn lowercase_rm_matches() {
        let html = "<span>rm2.15</span>";
        assert_eq!(extract_price(html).unwrap(), bd("2.15"));
    }

    #[test]
    fn missing_price_is_reported() {
        let err = extract_price("<html><body>Out of stock</body></html>").unwrap_err();
        assert!(matches!(err, ScrapeError::PriceNotFound));
        assert!(!err.is_retryable());
    }

    #[test]
    fn zero_price_is_rejected() {
        let err = extract_price("<span>RM 0.00</span>").unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
    }
}

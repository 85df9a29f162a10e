//! Best-effort Telegram notifications.
//!
//! One message per notable event (first observation, price up, price down) to
//! a single configured chat. Delivery is attempted once per event; failures
//! are reported to the caller for counting but never abort anything.

use anyhow::{anyhow, Result};
use bigdecimal::{BigDecimal, RoundingMode};
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use crate::compare::{Direction, PriceChange};
use crate::util::env::env_req;

pub struct TelegramNotifier {
    http: Client,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn from_env() -> Result<Self> {
        let token = env_req("TELEGRAM_BOT_TOKEN")?;
        let chat_id = env_req("TELEGRAM_CHAT_ID")?;
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            token,
            chat_id,
        })
    }

    /// Alert on a notable price change (direction `Up` or `Down`).
    pub async fn notify_change(&self, name: &str, url: &str, change: &PriceChange) -> Result<()> {
        let text = format_change_message(name, url, change);
        self.send(&text).await?;
        info!(product = name, direction = %change.direction, "sent price alert");
        Ok(())
    }

    /// Alert on a first (or returning) observation.
    pub async fn notify_new(&self, name: &str, url: &str, price: &BigDecimal) -> Result<()> {
        let text = format_new_message(name, url, price);
        self.send(&text).await?;
        info!(product = name, "sent first-price alert");
        Ok(())
    }

    async fn send(&self, text: &str) -> Result<()> {
        let api_url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": false,
        });
        let resp = self.http.post(&api_url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            // Keep the bot token out of the error text.
            let body = resp.text().await.unwrap_or_default();
            let body = body.chars().take(300).collect::<String>();
            return Err(anyhow!("telegram sendMessage failed: {status} body={body}"));
        }
        Ok(())
    }
}

fn fmt_price(price: &BigDecimal) -> String {
    price.with_scale_round(2, RoundingMode::HalfUp).to_string()
}

fn format_change_message(name: &str, url: &str, change: &PriceChange) -> String {
    let emoji = match change.direction {
        Direction::Down => "📉",
        _ => "📈",
    };
    let old = change
        .previous
        .as_ref()
        .map(fmt_price)
        .unwrap_or_else(|| "?".to_string());
    let pct = change.pct.map(|p| p * 100.0).unwrap_or(0.0);
    format!(
        "{emoji} *Price Alert: {name}*\n\n\
         Old Price: RM {old}\n\
         New Price: RM {new}\n\
         Change: {pct:+.2}%\n\n\
         [View Product]({url})",
        new = fmt_price(&change.current),
    )
}

fn format_new_message(name: &str, url: &str, price: &BigDecimal) -> String {
    format!(
        "🆕 *Now Tracking: {name}*\n\n\
         First Price: RM {price}\n\n\
         [View Product]({url})",
        price = fmt_price(price),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::classify;
    use std::str::FromStr;

    fn bd(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn change_message_carries_prices_and_signed_pct() {
        let change = classify(Some(&bd("10.00")), &bd("10.50"), 0.01);
        let msg = format_change_message("Milk 1L", "https://store.test/milk", &change);
        assert!(msg.contains("📈"));
        assert!(msg.contains("Old Price: RM 10.00"));
        assert!(msg.contains("New Price: RM 10.50"));
        assert!(msg.contains("Change: +5.00%"));
        assert!(msg.contains("(https://store.test/milk)"));
    }

    #[test]
    fn drop_message_uses_down_emoji_and_negative_pct() {
        let change = classify(Some(&bd("8.00")), &bd("6.00"), 0.01);
        let msg = format_change_message("Eggs", "https://store.test/eggs", &change);
        assert!(msg.contains("📉"));
        assert!(msg.contains("Change: -25.00%"));
    }

    #[test]
    fn new_message_rounds_to_cents() {
        let msg = format_new_message("Bread", "https://store.test/bread", &bd("4.5"));
        assert!(msg.contains("First Price: RM 4.50"));
    }
}

//! Google Sheets catalog source.
//!
//! Reads the tracked-product sheet through the Sheets REST API using a
//! service account: a short-lived RS256 JWT assertion is exchanged at the
//! account's token endpoint for a bearer token, then the sheet's values are
//! fetched in one GET.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{rows_from_cells, CatalogRow};
use crate::util::env::{env_opt, env_req};

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct SheetsCatalog {
    http: Client,
    key: ServiceAccountKey,
    sheet_id: String,
    tab: String,
}

impl SheetsCatalog {
    pub fn from_env() -> Result<Self> {
        let sheet_id = env_req("GOOGLE_SHEETS_ID")?;
        let tab = env_opt("GOOGLE_SHEETS_TAB").unwrap_or_else(|| "Sheet1".to_string());

        // The key arrives either as raw JSON or base64-encoded (multiline PEM
        // content survives env files badly).
        let raw = match env_opt("GOOGLE_SERVICE_ACCOUNT_JSON") {
            Some(v) => v,
            None => {
                let b64 = env_req("GOOGLE_SERVICE_ACCOUNT_JSON_B64")
                    .context("set GOOGLE_SERVICE_ACCOUNT_JSON or GOOGLE_SERVICE_ACCOUNT_JSON_B64")?;
                let bytes = STANDARD
                    .decode(b64.trim())
                    .context("GOOGLE_SERVICE_ACCOUNT_JSON_B64 is not valid base64")?;
                String::from_utf8(bytes).context("decoded service account key is not UTF-8")?
            }
        };
        let key: ServiceAccountKey =
            serde_json::from_str(&raw).context("invalid GOOGLE_SERVICE_ACCOUNT_JSON")?;

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            key,
            sheet_id,
            tab,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: self.key.client_email.clone(),
            scope: SHEETS_SCOPE.to_string(),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };
        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .context("service account private_key is not a valid RSA PEM")?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .context("failed to sign sheets JWT assertion")?;

        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!("sheets token exchange failed: {status} body={body}"));
        }
        let token: TokenResponse = resp.json().await?;
        debug!(expires_in = token.expires_in, "obtained sheets access token");
        Ok(token.access_token)
    }

    /// Fetch all catalog rows from the configured sheet tab.
    pub async fn fetch_rows(&self) -> Result<(Vec<CatalogRow>, usize)> {
        let token = self.access_token().await?;

        let mut url = url::Url::parse("https://sheets.googleapis.com/v4/spreadsheets/")
            .map_err(|e| anyhow!("invalid sheets base url: {e}"))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("invalid sheets base url"))?
            .push(&self.sheet_id)
            .push("values")
            .push(&self.tab);

        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(anyhow!(
                "sheets values fetch failed: {status} sheet={} tab={} body={body}",
                self.sheet_id,
                self.tab
            ));
        }

        let body: Value = resp.json().await?;
        let cells = values_to_cells(&body);
        let (rows, skipped) = rows_from_cells(&cells)?;
        info!(
            sheet = %self.sheet_id,
            tab = %self.tab,
            rows = rows.len(),
            skipped,
            "catalog fetched from Google Sheets"
        );
        Ok((rows, skipped))
    }
}

/// Flatten the Sheets `values` payload (array of arrays of cell values) into
/// strings. Non-string cells (numbers, bools) are stringified as-is.
fn values_to_cells(body: &Value) -> Vec<Vec<String>> {
    let Some(values) = body.get("values").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    values
        .iter()
        .map(|row| {
            row.as_array()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|c| match c {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_payload_flattens_to_cells() {
        let body = json!({
            "range": "Sheet1!A1:B3",
            "values": [
                ["item", "URL"],
                ["Milk 1L", "https://store.test/milk"],
                [42, true],
            ]
        });
        let cells = values_to_cells(&body);
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[1][0], "Milk 1L");
        assert_eq!(cells[2], vec!["42".to_string(), "true".to_string()]);
    }

    #[test]
    fn missing_values_key_is_empty() {
        assert!(values_to_cells(&json!({"range": "Sheet1!A1"})).is_empty());
    }

    #[test]
    fn values_feed_through_row_parser() {
        let body = json!({
            "values": [
                ["item", "URL"],
                ["Bread", "https://store.test/bread"],
                ["", "https://store.test/anon"],
            ]
        });
        let (rows, skipped) = rows_from_cells(&values_to_cells(&body)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(rows[0].name, "Bread");
    }
}

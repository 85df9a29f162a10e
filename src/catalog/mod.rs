//! Catalog of tracked products: ordered (name, url) pairs.
//!
//! The catalog normally lives in a Google Sheet; `CATALOG_CSV_PATH` overrides
//! it with a local CSV carrying the same `item,URL` header contract. Either
//! way, a failure to read the catalog is fatal for the run.

pub mod csv_file;
pub mod sheets;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::util::env::env_opt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub name: String,
    pub url: String,
}

/// Load the catalog from the configured source.
pub async fn load_catalog() -> Result<(Vec<CatalogRow>, usize)> {
    if let Some(path) = env_opt("CATALOG_CSV_PATH") {
        info!(path = %path, "loading catalog from local csv");
        return csv_file::load_catalog_csv(&path);
    }
    let sheets = sheets::SheetsCatalog::from_env()?;
    sheets
        .fetch_rows()
        .await
        .context("failed to read catalog from Google Sheets")
}

/// Turn raw header + data cells into catalog rows. The header row locates the
/// `item` and `URL` columns case-insensitively; rows with a blank name or url
/// are skipped with a warning and counted.
pub(crate) fn rows_from_cells(cells: &[Vec<String>]) -> Result<(Vec<CatalogRow>, usize)> {
    let Some((header, data)) = cells.split_first() else {
        return Ok((Vec::new(), 0));
    };

    let find = |wanted: &str| {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(wanted))
    };
    let name_idx = find("item").context("catalog header has no 'item' column")?;
    let url_idx = find("url").context("catalog header has no 'URL' column")?;

    let mut rows = Vec::with_capacity(data.len());
    let mut skipped = 0usize;
    for (i, record) in data.iter().enumerate() {
        let name = record.get(name_idx).map(|s| s.trim()).unwrap_or_default();
        let url = record.get(url_idx).map(|s| s.trim()).unwrap_or_default();
        if url.is_empty() {
            warn!(row = i + 2, "skipping catalog row with missing URL");
            skipped += 1;
            continue;
        }
        if name.is_empty() {
            warn!(row = i + 2, url, "skipping catalog row with missing item name");
            skipped += 1;
            continue;
        }
        rows.push(CatalogRow {
            name: name.to_string(),
            url: url.to_string(),
        });
    }
    Ok((rows, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &[&[&str]]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn parses_rows_by_header_name_case_insensitively() {
        let cells = cells(&[
            &["Item", "url"],
            &["Milk 1L", "https://store.test/milk"],
            &["Eggs", "https://store.test/eggs"],
        ]);
        let (rows, skipped) = rows_from_cells(&cells).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Milk 1L");
        assert_eq!(rows[1].url, "https://store.test/eggs");
    }

    #[test]
    fn skips_blank_rows_and_counts_them() {
        let cells = cells(&[
            &["item", "URL"],
            &["", "https://store.test/anon"],
            &["No URL product", ""],
            &["Butter", "https://store.test/butter"],
        ]);
        let (rows, skipped) = rows_from_cells(&cells).unwrap();
        assert_eq!(skipped, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Butter");
    }

    #[test]
    fn ragged_rows_do_not_panic() {
        let cells = cells(&[&["item", "URL"], &["only name"]]);
        let (rows, skipped) = rows_from_cells(&cells).unwrap();
        assert!(rows.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn missing_header_column_is_an_error() {
        let cells = cells(&[&["name", "link"], &["Milk", "https://x.test"]]);
        assert!(rows_from_cells(&cells).is_err());
    }

    #[test]
    fn empty_sheet_is_empty_catalog() {
        let (rows, skipped) = rows_from_cells(&[]).unwrap();
        assert!(rows.is_empty());
        assert_eq!(skipped, 0);
    }
}

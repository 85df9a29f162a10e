//! Local CSV catalog source, sharing the sheet's `item,URL` header contract.

use anyhow::{Context, Result};
use std::io::Read;

use super::{rows_from_cells, CatalogRow};

pub fn load_catalog_csv(path: &str) -> Result<(Vec<CatalogRow>, usize)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open catalog csv {path}"))?;
    read_catalog(file).with_context(|| format!("failed to parse catalog csv {path}"))
}

fn read_catalog<R: Read>(reader: R) -> Result<(Vec<CatalogRow>, usize)> {
    // flexible: ragged rows are the row parser's problem, not a hard error.
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut cells: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        cells.push(record.iter().map(|s| s.to_string()).collect());
    }
    rows_from_cells(&cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_catalog_csv() {
        let data = "item,URL\nMilk 1L,https://store.test/milk\nEggs,https://store.test/eggs\n";
        let (rows, skipped) = read_catalog(data.as_bytes()).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Milk 1L");
        assert_eq!(rows[1].url, "https://store.test/eggs");
    }

    #[test]
    fn blank_rows_are_skipped() {
        let data = "item,URL\n,https://store.test/anon\nButter,\n";
        let (rows, skipped) = read_catalog(data.as_bytes()).unwrap();
        assert!(rows.is_empty());
        assert_eq!(skipped, 2);
    }
}

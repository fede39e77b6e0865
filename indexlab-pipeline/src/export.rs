//! CSV export of the output series for downstream analytics surfaces.

use std::path::Path;

use thiserror::Error;

use indexlab_core::store::{StoreError, TableStore};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("csv write: {0}")]
    Csv(#[from] csv::Error),

    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write the index level series to a CSV file. Returns the row count.
pub fn export_levels_csv(store: &TableStore, out: &Path) -> Result<usize, ExportError> {
    let levels = store.load_levels()?;
    let mut writer = csv::Writer::from_path(out)?;
    for row in &levels {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(levels.len())
}

/// Write the full returns table (index and constituents) to a CSV file.
pub fn export_returns_csv(store: &TableStore, out: &Path) -> Result<usize, ExportError> {
    let returns = store.load_returns()?;
    let mut writer = csv::Writer::from_path(out)?;
    for row in &returns {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(returns.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use indexlab_core::domain::{IndexLevel, ReturnRow, INDEX_TICKER};

    #[test]
    fn exports_levels_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path().join("data"));
        store
            .replace_levels(&[IndexLevel {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                numerator: 140.0,
                level: 1000.0,
            }])
            .unwrap();

        let out = dir.path().join("levels.csv");
        let count = export_levels_csv(&store, &out).unwrap();
        assert_eq!(count, 1);

        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.starts_with("date,numerator,level"));
        assert!(content.contains("2024-01-02"));
    }

    #[test]
    fn exports_returns_including_index_series() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path().join("data"));
        store
            .replace_returns(&[ReturnRow {
                date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                ticker: INDEX_TICKER.into(),
                daily_return: 0.0071,
            }])
            .unwrap();

        let out = dir.path().join("returns.csv");
        let count = export_returns_csv(&store, &out).unwrap();
        assert_eq!(count, 1);

        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.contains("_INDEX_"));
    }

    #[test]
    fn empty_table_exports_zero_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path().join("data"));
        let out = dir.path().join("levels.csv");
        assert_eq!(export_levels_csv(&store, &out).unwrap(), 0);
    }
}

//! Constituent snapshot source.
//!
//! Rebalance snapshots arrive as CSV files with `rebalance_date,ticker,weight_pct`
//! columns, one full snapshot per rebalance event (a file may carry several
//! events). Rank is assigned from row order within each rebalance date, which
//! is what the deterministic tie-break in top-N selection keys on.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::ConstituentWeight;
use crate::universe::normalize_ticker;

#[derive(Debug, Error)]
pub enum ConstituentsError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("bad snapshot row in {path}: {message}")]
    BadRow { path: String, message: String },
}

#[derive(Debug, Deserialize)]
struct SnapshotRecord {
    rebalance_date: NaiveDate,
    ticker: String,
    weight_pct: f64,
}

/// Load rebalance snapshots from a CSV file, or from every `.csv` file in a
/// directory (processed in filename order).
pub fn load_snapshots(path: &Path) -> Result<Vec<ConstituentWeight>, ConstituentsError> {
    let mut rows = Vec::new();

    if path.is_dir() {
        let mut files: Vec<_> = fs::read_dir(path)
            .map_err(|e| ConstituentsError::Io {
                path: path.display().to_string(),
                source: e,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("csv"))
            .collect();
        files.sort();

        for file in files {
            rows.extend(load_snapshot_file(&file)?);
        }
    } else {
        rows.extend(load_snapshot_file(path)?);
    }

    // Rank by row order within each rebalance date, across all files read.
    let mut next_rank: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    let mut out = Vec::with_capacity(rows.len());
    for record in rows {
        let rank = next_rank.entry(record.rebalance_date).or_insert(0);
        out.push(ConstituentWeight {
            rebalance_date: record.rebalance_date,
            ticker: normalize_ticker(&record.ticker),
            weight_pct: record.weight_pct,
            rank: *rank,
        });
        *rank += 1;
    }

    Ok(out)
}

fn load_snapshot_file(path: &Path) -> Result<Vec<SnapshotRecord>, ConstituentsError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ConstituentsError::BadRow {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut records = Vec::new();
    for record in reader.deserialize::<SnapshotRecord>() {
        records.push(record.map_err(|e| ConstituentsError::BadRow {
            path: path.display().to_string(),
            message: e.to_string(),
        })?);
    }
    Ok(records)
}

/// Sum of weights per rebalance date, for audit logging. The source does not
/// guarantee snapshots sum to 1.0; callers warn rather than reject.
pub fn weight_sums(snapshots: &[ConstituentWeight]) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in snapshots {
        *sums.entry(row.rebalance_date).or_insert(0.0) += row.weight_pct;
    }
    sums
}

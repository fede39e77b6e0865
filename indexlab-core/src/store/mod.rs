//! Parquet-backed table store.
//!
//! Layout: `{data_dir}/{table}.parquet` plus a `{table}.meta.json` sidecar
//! (row count, key range hash, write timestamp). One file per relation:
//! price_quotes, canonical_prices, constituent_weights, daily_weights,
//! index_levels, returns.
//!
//! Writes are atomic (write to .tmp, rename into place) and rows are always
//! persisted in natural-key order, so recomputing a derived table from
//! unchanged inputs reproduces identical bytes. Three write disciplines:
//! - insert-if-absent (price quotes, weight snapshots: immutable once recorded)
//! - overwrite-per-key (canonical prices: recomputed when quotes change)
//! - full replace (daily weights, levels, returns: materialized caches)

mod codec;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    CanonicalPrice, ConstituentWeight, DailyWeight, IndexLevel, PriceQuote, ReturnRow,
};

pub const QUOTES_TABLE: &str = "price_quotes";
pub const CANONICAL_TABLE: &str = "canonical_prices";
pub const WEIGHTS_TABLE: &str = "constituent_weights";
pub const DAILY_WEIGHTS_TABLE: &str = "daily_weights";
pub const LEVELS_TABLE: &str = "index_levels";
pub const RETURNS_TABLE: &str = "returns";

/// All table names, in pipeline order.
pub const ALL_TABLES: [&str; 6] = [
    QUOTES_TABLE,
    CANONICAL_TABLE,
    WEIGHTS_TABLE,
    DAILY_WEIGHTS_TABLE,
    LEVELS_TABLE,
    RETURNS_TABLE,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("table validation error: {0}")]
    Validation(String),

    #[error("meta sidecar error: {0}")]
    Meta(String),
}

/// Metadata sidecar written next to each table file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub table: String,
    pub rows: usize,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

/// Outcome of an upsert against one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
}

/// Snapshot of one table's on-disk state, for status reporting.
#[derive(Debug, Clone)]
pub struct TableStatus {
    pub table: String,
    pub exists: bool,
    pub rows: Option<usize>,
    pub written_at: Option<chrono::NaiveDateTime>,
}

/// The Parquet table store.
pub struct TableStore {
    data_dir: PathBuf,
}

impl TableStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{table}.parquet"))
    }

    fn meta_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{table}.meta.json"))
    }

    // ── price_quotes (insert-if-absent) ─────────────────────────────

    pub fn upsert_quotes(&self, rows: &[PriceQuote]) -> Result<UpsertStats, StoreError> {
        let existing = self.load_quotes()?;
        let (merged, stats) = merge(
            existing,
            rows,
            |r| (r.ticker.clone(), r.date, r.provider.clone()),
            MergePolicy::InsertIfAbsent,
        );
        self.write_table(QUOTES_TABLE, codec::quotes_to_dataframe(&merged)?, &merged)?;
        Ok(stats)
    }

    pub fn load_quotes(&self) -> Result<Vec<PriceQuote>, StoreError> {
        match self.read_table(QUOTES_TABLE)? {
            Some(df) => codec::dataframe_to_quotes(&df),
            None => Ok(Vec::new()),
        }
    }

    // ── canonical_prices (overwrite per key) ────────────────────────

    pub fn upsert_canonical(&self, rows: &[CanonicalPrice]) -> Result<UpsertStats, StoreError> {
        let existing = self.load_canonical()?;
        let (merged, stats) = merge(
            existing,
            rows,
            |r| (r.ticker.clone(), r.date),
            MergePolicy::Overwrite,
        );
        self.write_table(
            CANONICAL_TABLE,
            codec::canonical_to_dataframe(&merged)?,
            &merged,
        )?;
        Ok(stats)
    }

    pub fn load_canonical(&self) -> Result<Vec<CanonicalPrice>, StoreError> {
        match self.read_table(CANONICAL_TABLE)? {
            Some(df) => codec::dataframe_to_canonical(&df),
            None => Ok(Vec::new()),
        }
    }

    // ── constituent_weights (append-only snapshots) ─────────────────

    pub fn append_weights(&self, rows: &[ConstituentWeight]) -> Result<UpsertStats, StoreError> {
        let existing = self.load_weights()?;
        let (merged, stats) = merge(
            existing,
            rows,
            |r| (r.rebalance_date, r.ticker.clone()),
            MergePolicy::InsertIfAbsent,
        );
        self.write_table(WEIGHTS_TABLE, codec::weights_to_dataframe(&merged)?, &merged)?;
        Ok(stats)
    }

    pub fn load_weights(&self) -> Result<Vec<ConstituentWeight>, StoreError> {
        match self.read_table(WEIGHTS_TABLE)? {
            Some(df) => codec::dataframe_to_weights(&df),
            None => Ok(Vec::new()),
        }
    }

    // ── daily_weights (full replace) ────────────────────────────────

    pub fn replace_daily_weights(&self, rows: &[DailyWeight]) -> Result<(), StoreError> {
        let sorted = sort_by_key(rows, |r| (r.date, r.ticker.clone()));
        self.write_table(
            DAILY_WEIGHTS_TABLE,
            codec::daily_weights_to_dataframe(&sorted)?,
            &sorted,
        )
    }

    pub fn load_daily_weights(&self) -> Result<Vec<DailyWeight>, StoreError> {
        match self.read_table(DAILY_WEIGHTS_TABLE)? {
            Some(df) => codec::dataframe_to_daily_weights(&df),
            None => Ok(Vec::new()),
        }
    }

    // ── index_levels (full replace) ─────────────────────────────────

    pub fn replace_levels(&self, rows: &[IndexLevel]) -> Result<(), StoreError> {
        let sorted = sort_by_key(rows, |r| r.date);
        self.write_table(LEVELS_TABLE, codec::levels_to_dataframe(&sorted)?, &sorted)
    }

    pub fn load_levels(&self) -> Result<Vec<IndexLevel>, StoreError> {
        match self.read_table(LEVELS_TABLE)? {
            Some(df) => codec::dataframe_to_levels(&df),
            None => Ok(Vec::new()),
        }
    }

    pub fn load_levels_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<IndexLevel>, StoreError> {
        Ok(self
            .load_levels()?
            .into_iter()
            .filter(|l| l.date >= start && l.date <= end)
            .collect())
    }

    // ── returns (full replace) ──────────────────────────────────────

    pub fn replace_returns(&self, rows: &[ReturnRow]) -> Result<(), StoreError> {
        let sorted = sort_by_key(rows, |r| (r.date, r.ticker.clone()));
        self.write_table(RETURNS_TABLE, codec::returns_to_dataframe(&sorted)?, &sorted)
    }

    pub fn load_returns(&self) -> Result<Vec<ReturnRow>, StoreError> {
        match self.read_table(RETURNS_TABLE)? {
            Some(df) => codec::dataframe_to_returns(&df),
            None => Ok(Vec::new()),
        }
    }

    pub fn load_returns_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ReturnRow>, StoreError> {
        Ok(self
            .load_returns()?
            .into_iter()
            .filter(|r| r.date >= start && r.date <= end)
            .collect())
    }

    // ── status / meta ───────────────────────────────────────────────

    pub fn get_meta(&self, table: &str) -> Option<TableMeta> {
        let content = fs::read_to_string(self.meta_path(table)).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn status(&self) -> Vec<TableStatus> {
        ALL_TABLES
            .iter()
            .map(|table| {
                let meta = self.get_meta(table);
                TableStatus {
                    table: table.to_string(),
                    exists: self.table_path(table).exists(),
                    rows: meta.as_ref().map(|m| m.rows),
                    written_at: meta.as_ref().map(|m| m.written_at),
                }
            })
            .collect()
    }

    // ── low-level I/O ───────────────────────────────────────────────

    fn write_table<T: Serialize>(
        &self,
        table: &str,
        df: DataFrame,
        rows: &[T],
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;

        let path = self.table_path(table);
        let tmp_path = path.with_extension("parquet.tmp");

        let file = fs::File::create(&tmp_path)?;
        ParquetWriter::new(file)
            .finish(&mut df.clone())
            .map_err(|e| StoreError::Parquet(format!("write {table}: {e}")))?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io(e)
        })?;

        let meta = TableMeta {
            table: table.to_string(),
            rows: rows.len(),
            data_hash: blake3::hash(
                &serde_json::to_vec(rows)
                    .map_err(|e| StoreError::Meta(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| StoreError::Meta(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(table), meta_json)?;

        Ok(())
    }

    fn read_table(&self, table: &str) -> Result<Option<DataFrame>, StoreError> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(None);
        }
        let file = fs::File::open(&path)?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| StoreError::Parquet(format!("read {table}: {e}")))?;
        Ok(Some(df))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MergePolicy {
    /// Keep the existing row when the key is already present.
    InsertIfAbsent,
    /// Replace the existing row when the incoming one differs.
    Overwrite,
}

/// Merge incoming rows into the existing set by natural key, returning the
/// merged rows in key order plus what happened to each incoming row.
fn merge<T, K, F>(
    existing: Vec<T>,
    incoming: &[T],
    key: F,
    policy: MergePolicy,
) -> (Vec<T>, UpsertStats)
where
    T: Clone + PartialEq,
    K: Ord,
    F: Fn(&T) -> K,
{
    use std::collections::btree_map::Entry;

    let mut by_key: BTreeMap<K, T> = existing.into_iter().map(|r| (key(&r), r)).collect();
    let mut stats = UpsertStats::default();

    for row in incoming {
        match by_key.entry(key(row)) {
            Entry::Vacant(slot) => {
                slot.insert(row.clone());
                stats.inserted += 1;
            }
            Entry::Occupied(mut slot) => {
                if policy == MergePolicy::Overwrite && slot.get() != row {
                    slot.insert(row.clone());
                    stats.replaced += 1;
                } else {
                    stats.unchanged += 1;
                }
            }
        }
    }

    (by_key.into_values().collect(), stats)
}

fn sort_by_key<T: Clone, K: Ord, F: Fn(&T) -> K>(rows: &[T], key: F) -> Vec<T> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| key(a).cmp(&key(b)));
    sorted
}

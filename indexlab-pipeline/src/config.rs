//! Serializable pipeline configuration.
//!
//! One TOML file configures the whole run: storage paths, provider roster,
//! reconciliation and audit thresholds, index calibration, and lock behavior.
//! Everything except the base date has a default, so a minimal config is just
//! `constituents_path` plus `[index] base_date`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use indexlab_core::benchmark::IndexConfig;
use indexlab_core::reconcile::ReconcileConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Complete configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the Parquet tables and (by default) the lock file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// CSV snapshot file, or a directory of them.
    pub constituents_path: PathBuf,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub reconcile: ReconcileSettings,

    #[serde(default)]
    pub audit: AuditSettings,

    #[serde(default)]
    pub impute: ImputeSettings,

    pub index: IndexSettings,

    #[serde(default)]
    pub ingest: IngestSettings,

    #[serde(default)]
    pub lock: LockSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider names to query, in order. Known: "yahoo", "stooq".
    #[serde(default = "default_enabled_providers")]
    pub enabled: Vec<String>,

    /// Provider whose values win reconciliation conflicts.
    #[serde(default = "default_preferred_provider")]
    pub preferred: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Max spread (percent of the lowest adj close) still treated as agreement.
    #[serde(default = "default_divergence_threshold")]
    pub divergence_threshold_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Coverage strictly below this marks a date as an inferred holiday.
    #[serde(default = "default_holiday_threshold")]
    pub holiday_coverage_threshold: f64,

    /// Coverage below this on a non-holiday weekday marks a bad day.
    #[serde(default = "default_min_daily_coverage")]
    pub min_daily_coverage: f64,

    /// More bad days than this fails the completeness audit.
    #[serde(default = "default_max_bad_days")]
    pub max_bad_days: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputeSettings {
    /// Max distinct imputed (ticker, date) cells surfaced for alerting per run.
    #[serde(default = "default_alert_cap")]
    pub alert_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Date at which the divisor is first calibrated.
    pub base_date: NaiveDate,

    /// Level published on the base date.
    #[serde(default = "default_base_value")]
    pub base_value: f64,

    /// Top-N cap applied to each rebalance snapshot.
    #[serde(default = "default_max_constituents")]
    pub max_constituents: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSettings {
    /// First date to request from providers. Defaults to the index base date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Last date to request. Defaults to today.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSettings {
    /// Lock file path. Defaults to `{data_dir}/pipeline.lock`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// How long a run waits for a held lock before giving up.
    #[serde(default = "default_lock_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.lock
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("pipeline.lock"))
    }

    pub fn to_index_config(&self) -> IndexConfig {
        IndexConfig {
            base_date: self.index.base_date,
            base_value: self.index.base_value,
        }
    }

    pub fn to_reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            preferred_provider: self.providers.preferred.clone(),
            divergence_threshold_pct: self.reconcile.divergence_threshold_pct,
        }
    }

    /// Inclusive date range requested from providers.
    pub fn ingest_range(&self) -> (NaiveDate, NaiveDate) {
        let start = self.ingest.start_date.unwrap_or(self.index.base_date);
        let end = self
            .ingest
            .end_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        (start, end)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_providers(),
            preferred: default_preferred_provider(),
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            divergence_threshold_pct: default_divergence_threshold(),
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            holiday_coverage_threshold: default_holiday_threshold(),
            min_daily_coverage: default_min_daily_coverage(),
            max_bad_days: default_max_bad_days(),
        }
    }
}

impl Default for ImputeSettings {
    fn default() -> Self {
        Self {
            alert_cap: default_alert_cap(),
        }
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            path: None,
            wait_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_enabled_providers() -> Vec<String> {
    vec!["yahoo".into(), "stooq".into()]
}

fn default_preferred_provider() -> String {
    "yahoo".into()
}

fn default_divergence_threshold() -> f64 {
    0.5
}

fn default_holiday_threshold() -> f64 {
    0.10
}

fn default_min_daily_coverage() -> f64 {
    0.80
}

fn default_max_bad_days() -> usize {
    5
}

fn default_alert_cap() -> usize {
    20
}

fn default_base_value() -> f64 {
    1000.0
}

fn default_max_constituents() -> usize {
    25
}

fn default_lock_timeout_secs() -> u64 {
    600
}

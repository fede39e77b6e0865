//! Canonical price reconciler.
//!
//! Merges the per-provider quotes for one (ticker, date) cell into a single
//! trusted price with a quality tier. Agreement across independent sources
//! blends estimates (HIGH); disagreement beyond the divergence threshold falls
//! back to the preferred provider and is recorded as CONFLICT for downstream
//! auditing rather than silently averaged.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{CanonicalPrice, Quality};

/// Pseudo-provider name recorded when the canonical value is a cross-provider median.
pub const MEDIAN_PROVIDER: &str = "MEDIAN";

/// Provider name recorded on forward-filled canonical rows.
pub const FORWARD_FILL_PROVIDER: &str = "FORWARD_FILL";

/// Reconciliation settings.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Provider whose values win when quotes diverge beyond the threshold.
    pub preferred_provider: String,
    /// Max relative spread (percent of the lowest adj close) still treated as agreement.
    pub divergence_threshold_pct: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "yahoo".into(),
            divergence_threshold_pct: 0.5,
        }
    }
}

/// One provider's usable quote for the cell being reconciled.
#[derive(Debug, Clone)]
pub struct CellQuote {
    pub provider: String,
    pub close: f64,
    pub adj_close: f64,
}

/// Reconciliation outcome for one (ticker, date) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub providers_ok: usize,
    pub chosen_provider: String,
    pub close: f64,
    pub adj_close: f64,
    pub quality: Quality,
    pub divergence_pct: Option<f64>,
}

impl Reconciled {
    /// Materialize the outcome as a canonical price row for the given cell.
    pub fn into_canonical(self, ticker: &str, date: NaiveDate) -> CanonicalPrice {
        CanonicalPrice {
            ticker: ticker.to_string(),
            date,
            close: self.close,
            adj_close: self.adj_close,
            quality: self.quality,
            chosen_provider: self.chosen_provider,
            divergence_pct: self.divergence_pct,
            imputed: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no provider quoted {ticker} on {date}")]
    NoPriceAvailable { ticker: String, date: NaiveDate },
}

/// Reconcile the provider quotes for one (ticker, date) cell.
///
/// Quotes with non-finite values are dropped before counting providers, so an
/// upstream NaN never poisons the median.
pub fn reconcile(
    ticker: &str,
    date: NaiveDate,
    quotes: &[CellQuote],
    config: &ReconcileConfig,
) -> Result<Reconciled, ReconcileError> {
    let mut usable: Vec<&CellQuote> = quotes
        .iter()
        .filter(|q| q.close.is_finite() && q.adj_close.is_finite())
        .collect();

    if usable.is_empty() {
        return Err(ReconcileError::NoPriceAvailable {
            ticker: ticker.to_string(),
            date,
        });
    }

    // Deterministic regardless of the caller's map iteration order.
    usable.sort_by(|a, b| a.provider.cmp(&b.provider));

    if usable.len() == 1 {
        let q = usable[0];
        return Ok(Reconciled {
            providers_ok: 1,
            chosen_provider: q.provider.clone(),
            close: q.close,
            adj_close: q.adj_close,
            quality: Quality::Low,
            divergence_pct: None,
        });
    }

    let adj_closes: Vec<f64> = usable.iter().map(|q| q.adj_close).collect();
    let closes: Vec<f64> = usable.iter().map(|q| q.close).collect();

    let lo = adj_closes.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = adj_closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let divergence_pct = 100.0 * (hi - lo) / lo;

    if divergence_pct <= config.divergence_threshold_pct {
        Ok(Reconciled {
            providers_ok: usable.len(),
            chosen_provider: MEDIAN_PROVIDER.to_string(),
            close: median(&closes),
            adj_close: median(&adj_closes),
            quality: Quality::High,
            divergence_pct: Some(divergence_pct),
        })
    } else {
        // Preferred provider wins outright; if it did not quote this cell the
        // lexicographically first provider stands in so the result stays
        // deterministic.
        let chosen = usable
            .iter()
            .find(|q| q.provider == config.preferred_provider)
            .unwrap_or(&usable[0]);
        Ok(Reconciled {
            providers_ok: usable.len(),
            chosen_provider: chosen.provider.clone(),
            close: chosen.close,
            adj_close: chosen.adj_close,
            quality: Quality::Conflict,
            divergence_pct: Some(divergence_pct),
        })
    }
}

/// Median of a non-empty slice; for an even count, the mean of the middle two.
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("non-finite values filtered"));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

//! Price rows: raw provider quotes and reconciled canonical prices.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A raw daily quote from one provider. Immutable once recorded.
///
/// Natural key: (ticker, date, provider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub ticker: String,
    pub date: NaiveDate,
    pub provider: String,
    pub close: f64,
    pub adj_close: f64,
}

/// Confidence tier of a canonical price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    /// Multiple providers agreed within the divergence threshold.
    High,
    /// Only a single provider quoted the cell.
    Low,
    /// Providers disagreed beyond the threshold; the preferred provider won.
    Conflict,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "HIGH",
            Quality::Low => "LOW",
            Quality::Conflict => "CONFLICT",
        }
    }

    pub fn parse(s: &str) -> Option<Quality> {
        match s {
            "HIGH" => Some(Quality::High),
            "LOW" => Some(Quality::Low),
            "CONFLICT" => Some(Quality::Conflict),
            _ => None,
        }
    }
}

/// The single trusted price per (ticker, date) after reconciliation.
///
/// Recomputed (overwritten, never appended) whenever quote data for the cell
/// changes. `imputed` marks forward-filled rows so they are distinguishable
/// from directly observed prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPrice {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: f64,
    pub adj_close: f64,
    pub quality: Quality,
    pub chosen_provider: String,
    pub divergence_pct: Option<f64>,
    pub imputed: bool,
}

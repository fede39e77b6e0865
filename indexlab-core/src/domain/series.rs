//! Derived output series: index levels and daily returns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reserved ticker under which the index's own return series is stored.
pub const INDEX_TICKER: &str = "_INDEX_";

/// The published index level for one trading date.
///
/// `level = numerator / divisor`, where the divisor is a running scalar
/// recalibrated at rebalance boundaries and not persisted per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexLevel {
    pub date: NaiveDate,
    pub numerator: f64,
    pub level: f64,
}

/// A daily percentage return for one series (a constituent or the index).
///
/// The first observation of a series has no return and is never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub daily_return: f64,
}

//! Constituent weight rows: rebalance snapshots and the expanded daily schedule.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of a rebalance snapshot. Append-only; a full snapshot is written
/// per rebalance event and corrections arrive as new snapshots.
///
/// Natural key: (rebalance_date, ticker). `rank` is the row's position within
/// its snapshot and breaks weight ties deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstituentWeight {
    pub rebalance_date: NaiveDate,
    pub ticker: String,
    pub weight_pct: f64,
    pub rank: u32,
}

/// A weight active on one trading date, derived from the snapshot schedule.
///
/// Valid from its snapshot's rebalance date through the day before the same
/// ticker's next snapshot, else through the last available trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeight {
    pub date: NaiveDate,
    pub ticker: String,
    pub weight: f64,
}

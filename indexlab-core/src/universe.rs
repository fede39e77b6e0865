//! Universe selection and daily weight expansion.
//!
//! Rebalance snapshots are periodic; the index needs a weight per trading
//! date. Each snapshot row stays active from its rebalance date through the
//! day before the same ticker's next snapshot, else through the last
//! available trading date. Expansion is explicit iteration over sorted
//! (ticker, rebalance_date) pairs producing date-range intervals.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{ConstituentWeight, DailyWeight};

/// Top-N constituents by weight.
///
/// Non-positive weights are excluded; ties break by rank ascending, then by
/// normalized ticker, so the selection is a deterministic total order.
pub fn select_top_weighted(rows: &[ConstituentWeight], limit: usize) -> Vec<String> {
    let mut eligible: Vec<&ConstituentWeight> =
        rows.iter().filter(|row| row.weight_pct > 0.0).collect();

    eligible.sort_by(|a, b| {
        b.weight_pct
            .partial_cmp(&a.weight_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.rank.cmp(&b.rank))
            .then(normalize_ticker(&a.ticker).cmp(&normalize_ticker(&b.ticker)))
    });

    eligible
        .into_iter()
        .take(limit)
        .map(|row| row.ticker.clone())
        .collect()
}

/// Uppercased, whitespace-trimmed ticker used for ordering and joins.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_ascii_uppercase()
}

/// The distinct rebalance dates present in a snapshot set, ascending.
pub fn rebalance_dates(snapshots: &[ConstituentWeight]) -> BTreeSet<NaiveDate> {
    snapshots.iter().map(|row| row.rebalance_date).collect()
}

/// Expand rebalance snapshots into a per-trading-date weight schedule.
///
/// `trading_dates` must be sorted ascending. Output is ordered by
/// (date, ticker). Weights are carried as given; the snapshot source is not
/// required to normalize them to sum to 1.
pub fn expand_daily_weights(
    snapshots: &[ConstituentWeight],
    trading_dates: &[NaiveDate],
) -> Vec<DailyWeight> {
    if snapshots.is_empty() || trading_dates.is_empty() {
        return Vec::new();
    }
    let last_trading_date = *trading_dates.last().expect("non-empty");

    // Per-ticker snapshot history, rebalance date ascending.
    let mut by_ticker: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for row in snapshots {
        by_ticker
            .entry(normalize_ticker(&row.ticker))
            .or_default()
            .insert(row.rebalance_date, row.weight_pct);
    }

    let mut out: BTreeMap<(NaiveDate, String), f64> = BTreeMap::new();

    for (ticker, history) in &by_ticker {
        let mut intervals = history.iter().peekable();
        while let Some((start, weight)) = intervals.next() {
            // Active through the day before this ticker's next snapshot,
            // else through the last trading date.
            let end_exclusive = intervals
                .peek()
                .map(|(next_start, _)| **next_start)
                .unwrap_or_else(|| last_trading_date + chrono::Duration::days(1));

            for date in trading_dates {
                if *date >= *start && *date < end_exclusive {
                    out.insert((*date, ticker.clone()), *weight);
                }
            }
        }
    }

    out.into_iter()
        .map(|((date, ticker), weight)| DailyWeight {
            date,
            ticker,
            weight,
        })
        .collect()
}

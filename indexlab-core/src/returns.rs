//! Daily return derivation for the index and each constituent.
//!
//! "Previous" means the previous available observation within the same
//! series, not the previous calendar date, so a gap in one ticker's history
//! never distorts another ticker's chain. The first observation of any
//! series has no return and is omitted.

use std::collections::BTreeMap;

use crate::domain::{CanonicalPrice, IndexLevel, ReturnRow, INDEX_TICKER};

/// Daily returns of the index level series, stored under [`INDEX_TICKER`].
pub fn index_returns(levels: &[IndexLevel]) -> Vec<ReturnRow> {
    let mut sorted: Vec<&IndexLevel> = levels.iter().collect();
    sorted.sort_by_key(|l| l.date);

    let mut out = Vec::new();
    let mut prev: Option<f64> = None;
    for level in sorted {
        if let Some(prev_level) = prev {
            if prev_level != 0.0 {
                out.push(ReturnRow {
                    date: level.date,
                    ticker: INDEX_TICKER.to_string(),
                    daily_return: level.level / prev_level - 1.0,
                });
            }
        }
        prev = Some(level.level);
    }
    out
}

/// Daily returns per ticker from canonical adjusted closes.
///
/// Output is ordered by (ticker, date) — deterministic for idempotent persistence.
pub fn constituent_returns(prices: &[CanonicalPrice]) -> Vec<ReturnRow> {
    let mut by_ticker: BTreeMap<&str, BTreeMap<chrono::NaiveDate, f64>> = BTreeMap::new();
    for row in prices {
        by_ticker
            .entry(row.ticker.as_str())
            .or_default()
            .insert(row.date, row.adj_close);
    }

    let mut out = Vec::new();
    for (ticker, series) in by_ticker {
        let mut prev: Option<f64> = None;
        for (date, adj_close) in series {
            if let Some(prev_price) = prev {
                if prev_price != 0.0 {
                    out.push(ReturnRow {
                        date,
                        ticker: ticker.to_string(),
                        daily_return: adj_close / prev_price - 1.0,
                    });
                }
            }
            prev = Some(adj_close);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Quality;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn level(date: &str, value: f64) -> IndexLevel {
        IndexLevel {
            date: d(date),
            numerator: value,
            level: value,
        }
    }

    fn price(ticker: &str, date: &str, adj_close: f64) -> CanonicalPrice {
        CanonicalPrice {
            ticker: ticker.into(),
            date: d(date),
            close: adj_close,
            adj_close,
            quality: Quality::Low,
            chosen_provider: "yahoo".into(),
            divergence_pct: None,
            imputed: false,
        }
    }

    #[test]
    fn first_index_observation_has_no_return() {
        let levels = vec![level("2024-01-02", 1000.0), level("2024-01-03", 1010.0)];
        let returns = index_returns(&levels);
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].date, d("2024-01-03"));
        assert_eq!(returns[0].ticker, INDEX_TICKER);
        assert!((returns[0].daily_return - 0.01).abs() < 1e-12);
    }

    #[test]
    fn index_returns_sort_unordered_input() {
        let levels = vec![level("2024-01-03", 1100.0), level("2024-01-02", 1000.0)];
        let returns = index_returns(&levels);
        assert_eq!(returns.len(), 1);
        assert!((returns[0].daily_return - 0.10).abs() < 1e-12);
    }

    #[test]
    fn ticker_chains_are_independent_across_gaps() {
        let prices = vec![
            price("AAA", "2024-01-02", 100.0),
            price("AAA", "2024-01-03", 110.0),
            price("AAA", "2024-01-04", 121.0),
            // BBB missing 2024-01-03: its return on 01-04 spans the gap.
            price("BBB", "2024-01-02", 50.0),
            price("BBB", "2024-01-04", 55.0),
        ];

        let returns = constituent_returns(&prices);
        let aaa: Vec<&ReturnRow> = returns.iter().filter(|r| r.ticker == "AAA").collect();
        let bbb: Vec<&ReturnRow> = returns.iter().filter(|r| r.ticker == "BBB").collect();

        assert_eq!(aaa.len(), 2);
        assert!((aaa[0].daily_return - 0.10).abs() < 1e-12);
        assert!((aaa[1].daily_return - 0.10).abs() < 1e-12);

        assert_eq!(bbb.len(), 1);
        assert_eq!(bbb[0].date, d("2024-01-04"));
        assert!((bbb[0].daily_return - 0.10).abs() < 1e-12);
    }

    #[test]
    fn single_observation_series_yields_nothing() {
        let prices = vec![price("AAA", "2024-01-02", 100.0)];
        assert!(constituent_returns(&prices).is_empty());
    }

    #[test]
    fn zero_previous_price_is_skipped() {
        let prices = vec![
            price("AAA", "2024-01-02", 0.0),
            price("AAA", "2024-01-03", 10.0),
            price("AAA", "2024-01-04", 11.0),
        ];
        let returns = constituent_returns(&prices);
        // 01-03 has no defined return off a zero base; 01-04 does.
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].date, d("2024-01-04"));
    }
}

//! Forward-fill imputer for missing canonical prices.
//!
//! A cell is expected when its date is in the trading calendar and its ticker
//! is in the active universe. Expected-but-absent cells are filled with the
//! ticker's most recent prior canonical price; tickers with no history yet
//! stay unfilled. Imputed rows carry `imputed = true` and the FORWARD_FILL
//! provider marker so they never masquerade as observed prices.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::domain::{CanonicalPrice, Quality};
use crate::reconcile::FORWARD_FILL_PROVIDER;

/// Forward-fill the gaps in the canonical price series.
///
/// Returns only the newly created rows. Fills chain: an imputed value becomes
/// the carry value for the next gap, so a multi-day outage fills completely.
pub fn forward_fill(
    canonical: &[CanonicalPrice],
    expected_dates: &[NaiveDate],
    tickers: &[String],
) -> Vec<CanonicalPrice> {
    // Per-ticker observed series, date ascending.
    let mut by_ticker: HashMap<&str, BTreeMap<NaiveDate, &CanonicalPrice>> = HashMap::new();
    for row in canonical {
        by_ticker
            .entry(row.ticker.as_str())
            .or_default()
            .insert(row.date, row);
    }

    let mut filled = Vec::new();

    for ticker in tickers {
        let observed = by_ticker.get(ticker.as_str());
        let mut last: Option<(f64, f64)> = None; // (close, adj_close)

        for date in expected_dates {
            match observed.and_then(|m| m.get(date)) {
                Some(row) => last = Some((row.close, row.adj_close)),
                None => {
                    if let Some((close, adj_close)) = last {
                        filled.push(CanonicalPrice {
                            ticker: ticker.clone(),
                            date: *date,
                            close,
                            adj_close,
                            quality: Quality::Low,
                            chosen_provider: FORWARD_FILL_PROVIDER.to_string(),
                            divergence_pct: None,
                            imputed: true,
                        });
                        // The fill itself becomes the carry value; prices are
                        // unchanged so `last` needs no update.
                    }
                }
            }
        }
    }

    filled
}

/// Bound how many distinct imputed (ticker, date) cells are surfaced for
/// alerting per run. Deterministic: date ascending, then ticker.
pub fn select_alert_candidates(
    imputed: &[CanonicalPrice],
    cap: usize,
) -> Vec<(String, NaiveDate)> {
    let mut cells: Vec<(NaiveDate, String)> = imputed
        .iter()
        .filter(|row| row.imputed)
        .map(|row| (row.date, row.ticker.clone()))
        .collect();
    cells.sort();
    cells.dedup();
    cells
        .into_iter()
        .take(cap)
        .map(|(date, ticker)| (ticker, date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn observed(ticker: &str, date: &str, adj_close: f64) -> CanonicalPrice {
        CanonicalPrice {
            ticker: ticker.into(),
            date: d(date),
            close: adj_close + 0.5,
            adj_close,
            quality: Quality::High,
            chosen_provider: "MEDIAN".into(),
            divergence_pct: Some(0.1),
            imputed: false,
        }
    }

    #[test]
    fn fills_gap_with_most_recent_prior_price() {
        let canonical = vec![
            observed("AAPL", "2024-01-02", 100.0),
            observed("AAPL", "2024-01-04", 102.0),
        ];
        let dates = vec![d("2024-01-02"), d("2024-01-03"), d("2024-01-04")];
        let tickers = vec!["AAPL".to_string()];

        let filled = forward_fill(&canonical, &dates, &tickers);
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].date, d("2024-01-03"));
        assert_eq!(filled[0].adj_close, 100.0);
        assert!(filled[0].imputed);
        assert_eq!(filled[0].chosen_provider, FORWARD_FILL_PROVIDER);
        assert_eq!(filled[0].quality, Quality::Low);
    }

    #[test]
    fn no_history_stays_unfilled() {
        let canonical = vec![observed("AAPL", "2024-01-03", 100.0)];
        let dates = vec![d("2024-01-02"), d("2024-01-03")];
        let tickers = vec!["AAPL".to_string()];

        // 2024-01-02 precedes the first observation — nothing to carry.
        let filled = forward_fill(&canonical, &dates, &tickers);
        assert!(filled.is_empty());
    }

    #[test]
    fn multi_day_outage_fills_completely() {
        let canonical = vec![observed("AAPL", "2024-01-02", 100.0)];
        let dates = vec![
            d("2024-01-02"),
            d("2024-01-03"),
            d("2024-01-04"),
            d("2024-01-05"),
        ];
        let tickers = vec!["AAPL".to_string()];

        let filled = forward_fill(&canonical, &dates, &tickers);
        assert_eq!(filled.len(), 3);
        assert!(filled.iter().all(|row| row.adj_close == 100.0));
    }

    #[test]
    fn tickers_fill_independently() {
        let canonical = vec![
            observed("AAPL", "2024-01-02", 100.0),
            observed("MSFT", "2024-01-03", 50.0),
        ];
        let dates = vec![d("2024-01-02"), d("2024-01-03"), d("2024-01-04")];
        let tickers = vec!["AAPL".to_string(), "MSFT".to_string()];

        let filled = forward_fill(&canonical, &dates, &tickers);
        let aapl: Vec<_> = filled.iter().filter(|r| r.ticker == "AAPL").collect();
        let msft: Vec<_> = filled.iter().filter(|r| r.ticker == "MSFT").collect();
        assert_eq!(aapl.len(), 2); // 01-03 and 01-04
        assert_eq!(msft.len(), 1); // 01-04 only
    }

    #[test]
    fn alert_candidates_are_capped_and_ordered() {
        let canonical = vec![observed("AAPL", "2024-01-02", 100.0)];
        let dates: Vec<NaiveDate> = (2..=12).map(|day| d(&format!("2024-01-{day:02}"))).collect();
        let filled = forward_fill(&canonical, &dates, &["AAPL".to_string()]);
        assert_eq!(filled.len(), 10);

        let alerts = select_alert_candidates(&filled, 3);
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[0], ("AAPL".to_string(), d("2024-01-03")));
        assert_eq!(alerts[2], ("AAPL".to_string(), d("2024-01-05")));
    }

    #[test]
    fn alert_candidates_ignore_observed_rows() {
        let rows = vec![observed("AAPL", "2024-01-02", 100.0)];
        assert!(select_alert_candidates(&rows, 10).is_empty());
    }
}

//! Trading calendar and data-quality audit.
//!
//! Holidays are not configured from an exchange table; they are inferred from
//! coverage. A weekday where almost nothing in the universe priced is treated
//! as an expected zero-activity day, while a weekday with merely low coverage
//! is an unexplained ingestion gap (a "bad day").

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Inclusive sequence of calendar dates between start and end, excluding
/// Saturdays and Sundays. Empty when start > end.
pub fn generate_weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut day = start;
    while day <= end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        day += Duration::days(1);
    }
    out
}

/// Fraction-of-universe-priced per date, from per-date priced counts.
///
/// Every weekday in the window gets an entry; dates with no priced tickers get 0.0.
pub fn build_coverage(
    weekdays: &[NaiveDate],
    priced_counts: &BTreeMap<NaiveDate, usize>,
    universe_size: usize,
) -> BTreeMap<NaiveDate, f64> {
    weekdays
        .iter()
        .map(|date| {
            let count = priced_counts.get(date).copied().unwrap_or(0);
            let fraction = if universe_size == 0 {
                0.0
            } else {
                count as f64 / universe_size as f64
            };
            (*date, fraction)
        })
        .collect()
}

/// Dates whose coverage is strictly below `threshold` are inferred holidays.
pub fn infer_holidays(
    coverage: &BTreeMap<NaiveDate, f64>,
    threshold: f64,
) -> BTreeSet<NaiveDate> {
    coverage
        .iter()
        .filter(|(_, fraction)| **fraction < threshold)
        .map(|(date, _)| *date)
        .collect()
}

/// Non-holiday weekdays whose coverage is below `min_daily_coverage`,
/// sorted by date. These are unexplained ingestion gaps.
pub fn find_bad_days(
    coverage: &BTreeMap<NaiveDate, f64>,
    holidays: &BTreeSet<NaiveDate>,
    min_daily_coverage: f64,
) -> Vec<NaiveDate> {
    coverage
        .iter()
        .filter(|(date, fraction)| {
            !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
                && !holidays.contains(*date)
                && **fraction < min_daily_coverage
        })
        .map(|(date, _)| *date)
        .collect()
}

/// Overall audit verdict for a date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Pass,
    Fail,
}

/// Result of a completeness audit: the verdict plus the offending dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub status: AuditStatus,
    pub bad_days: Vec<NaiveDate>,
}

/// FAIL when more than `max_bad_days` unexplained gaps remain after holiday inference.
pub fn evaluate_completeness(
    coverage: &BTreeMap<NaiveDate, f64>,
    holidays: &BTreeSet<NaiveDate>,
    min_daily_coverage: f64,
    max_bad_days: usize,
) -> CompletenessReport {
    let bad_days = find_bad_days(coverage, holidays, min_daily_coverage);
    let status = if bad_days.len() > max_bad_days {
        AuditStatus::Fail
    } else {
        AuditStatus::Pass
    };
    CompletenessReport { status, bad_days }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn weekdays_exclude_weekends() {
        // Fri 2025-01-03 through Mon 2025-01-06
        let days = generate_weekdays(d("2025-01-03"), d("2025-01-06"));
        assert_eq!(days, vec![d("2025-01-03"), d("2025-01-06")]);
    }

    #[test]
    fn weekdays_inclusive_single_day() {
        assert_eq!(
            generate_weekdays(d("2025-01-06"), d("2025-01-06")),
            vec![d("2025-01-06")]
        );
        assert!(generate_weekdays(d("2025-01-04"), d("2025-01-05")).is_empty());
    }

    #[test]
    fn weekdays_empty_when_start_after_end() {
        assert!(generate_weekdays(d("2025-01-06"), d("2025-01-03")).is_empty());
    }

    #[test]
    fn holidays_inferred_strictly_below_threshold() {
        let mut coverage = BTreeMap::new();
        coverage.insert(d("2025-01-02"), 0.05);
        coverage.insert(d("2025-01-03"), 0.60);

        let holidays = infer_holidays(&coverage, 0.10);
        assert!(holidays.contains(&d("2025-01-02")));
        assert!(!holidays.contains(&d("2025-01-03")));
    }

    #[test]
    fn coverage_exactly_at_threshold_is_not_holiday() {
        let mut coverage = BTreeMap::new();
        coverage.insert(d("2025-01-02"), 0.10);
        assert!(infer_holidays(&coverage, 0.10).is_empty());
    }

    #[test]
    fn bad_days_exclude_inferred_holidays() {
        let mut coverage = BTreeMap::new();
        coverage.insert(d("2025-01-02"), 0.05); // holiday (below 0.10)
        coverage.insert(d("2025-01-03"), 0.40); // bad day (below 0.80)
        coverage.insert(d("2025-01-06"), 0.95); // fine

        let holidays = infer_holidays(&coverage, 0.10);
        let bad = find_bad_days(&coverage, &holidays, 0.80);
        assert_eq!(bad, vec![d("2025-01-03")]);
    }

    #[test]
    fn completeness_fails_above_max_bad_days() {
        let mut coverage = BTreeMap::new();
        coverage.insert(d("2025-01-02"), 0.40);
        coverage.insert(d("2025-01-03"), 0.40);
        let holidays = BTreeSet::new();

        let pass = evaluate_completeness(&coverage, &holidays, 0.80, 2);
        assert_eq!(pass.status, AuditStatus::Pass);
        assert_eq!(pass.bad_days.len(), 2);

        let fail = evaluate_completeness(&coverage, &holidays, 0.80, 1);
        assert_eq!(fail.status, AuditStatus::Fail);
    }

    #[test]
    fn coverage_defaults_missing_dates_to_zero() {
        let weekdays = vec![d("2025-01-02"), d("2025-01-03")];
        let mut counts = BTreeMap::new();
        counts.insert(d("2025-01-02"), 3);

        let coverage = build_coverage(&weekdays, &counts, 4);
        assert_eq!(coverage[&d("2025-01-02")], 0.75);
        assert_eq!(coverage[&d("2025-01-03")], 0.0);
    }

    #[test]
    fn coverage_with_empty_universe_is_zero() {
        let weekdays = vec![d("2025-01-02")];
        let coverage = build_coverage(&weekdays, &BTreeMap::new(), 0);
        assert_eq!(coverage[&d("2025-01-02")], 0.0);
    }
}

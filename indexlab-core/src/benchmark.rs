//! Divisor-based index level calculation.
//!
//! The index level is a weighted price sum divided by a running divisor. The
//! divisor is calibrated once at the base date (so the base date publishes the
//! configured base value) and recalibrated at every rebalance so the level is
//! unaffected by the composition change itself — only by subsequent price
//! moves. Recalibration solves `numerator_new / divisor_new = level_before`
//! where `level_before` is the level the outgoing composition would have
//! published on the rebalance date.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use log::{debug, warn};
use thiserror::Error;

use crate::domain::{CanonicalPrice, DailyWeight, IndexLevel};

/// Index calibration settings.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Date at which the divisor is first calibrated.
    pub base_date: NaiveDate,
    /// Level published on the base date.
    pub base_value: f64,
}

#[derive(Debug, Error)]
pub enum IndexCalcError {
    #[error("divisor is zero; no level can be computed")]
    UndefinedDivisor,
    #[error("no priced constituents on base date {base_date}")]
    MissingBaseNumerator { base_date: NaiveDate },
}

/// Weighted price sum over the key intersection, then divide by the divisor.
///
/// Tickers present in only one of the maps contribute nothing.
pub fn compute_index_level(
    holdings: &HashMap<String, f64>,
    prices: &HashMap<String, f64>,
    divisor: f64,
) -> Result<IndexLevelCalc, IndexCalcError> {
    if divisor == 0.0 {
        return Err(IndexCalcError::UndefinedDivisor);
    }
    let numerator = weighted_sum(holdings, prices);
    Ok(IndexLevelCalc {
        numerator,
        level: numerator / divisor,
    })
}

/// Numerator/level pair from a standalone level computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexLevelCalc {
    pub numerator: f64,
    pub level: f64,
}

/// Divisor that makes the new composition publish exactly `old_level`.
pub fn compute_divisor_for_continuity(
    old_level: f64,
    new_holdings: &HashMap<String, f64>,
    new_prices: &HashMap<String, f64>,
) -> Result<f64, IndexCalcError> {
    if old_level == 0.0 {
        return Err(IndexCalcError::UndefinedDivisor);
    }
    Ok(weighted_sum(new_holdings, new_prices) / old_level)
}

fn weighted_sum(holdings: &HashMap<String, f64>, prices: &HashMap<String, f64>) -> f64 {
    holdings
        .iter()
        .filter_map(|(ticker, qty)| prices.get(ticker).map(|price| qty * price))
        .sum()
}

/// Compute the full index level series from the daily weight schedule and
/// canonical prices.
///
/// Dates are processed ascending from the base date. A ticker weighted but
/// unpriced on a date is dropped from that date's numerator (inner join); a
/// date with no priced constituents at all publishes no level. The base-date
/// numerator must exist — without it no divisor is defined and the whole
/// calculation fails.
pub fn calculate_levels(
    daily_weights: &[DailyWeight],
    prices: &[CanonicalPrice],
    rebalance_dates: &BTreeSet<NaiveDate>,
    config: &IndexConfig,
) -> Result<Vec<IndexLevel>, IndexCalcError> {
    let weights_by_date = group_weights(daily_weights);
    let prices_by_date = group_prices(prices);

    let base_weights = weights_by_date
        .get(&config.base_date)
        .ok_or(IndexCalcError::MissingBaseNumerator {
            base_date: config.base_date,
        })?;
    let base_prices = prices_by_date
        .get(&config.base_date)
        .ok_or(IndexCalcError::MissingBaseNumerator {
            base_date: config.base_date,
        })?;

    let base_numerator = weighted_sum(base_weights, base_prices);
    if base_numerator <= 0.0 {
        return Err(IndexCalcError::MissingBaseNumerator {
            base_date: config.base_date,
        });
    }
    let mut divisor = base_numerator / config.base_value;

    let mut out = Vec::new();
    let mut prev_weights: Option<&HashMap<String, f64>> = None;

    for (date, weights) in weights_by_date.range(config.base_date..) {
        let Some(day_prices) = prices_by_date.get(date) else {
            debug!("no canonical prices on {date}; no level published");
            prev_weights = Some(weights);
            continue;
        };

        let numerator = weighted_sum(weights, day_prices);
        if numerator <= 0.0 {
            debug!("empty numerator on {date}; no level published");
            prev_weights = Some(weights);
            continue;
        }

        if rebalance_dates.contains(date) && *date != config.base_date {
            // Level the outgoing composition would have published today.
            match prev_weights.map(|w| weighted_sum(w, day_prices)) {
                Some(old_numerator) if old_numerator > 0.0 => {
                    let level_before = old_numerator / divisor;
                    divisor = compute_divisor_for_continuity(level_before, weights, day_prices)?;
                }
                _ => {
                    // No priced overlap with the outgoing composition; the
                    // divisor carries over and the level may step.
                    warn!("rebalance on {date} without a priced outgoing composition");
                }
            }
        }

        out.push(IndexLevel {
            date: *date,
            numerator,
            level: numerator / divisor,
        });
        prev_weights = Some(weights);
    }

    Ok(out)
}

fn group_weights(daily_weights: &[DailyWeight]) -> BTreeMap<NaiveDate, HashMap<String, f64>> {
    let mut by_date: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();
    for row in daily_weights {
        by_date
            .entry(row.date)
            .or_default()
            .insert(row.ticker.clone(), row.weight);
    }
    by_date
}

fn group_prices(prices: &[CanonicalPrice]) -> BTreeMap<NaiveDate, HashMap<String, f64>> {
    let mut by_date: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();
    for row in prices {
        by_date
            .entry(row.date)
            .or_default()
            .insert(row.ticker.clone(), row.adj_close);
    }
    by_date
}

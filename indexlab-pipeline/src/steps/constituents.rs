//! Step 3: expand rebalance snapshots into the daily weight schedule.
//!
//! Each snapshot is first capped to the configured top-N by weight, then
//! expanded across the actual priced trading dates. The daily_weights table
//! is a materialized cache: fully recomputed and replaced every run.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use indexlab_core::domain::ConstituentWeight;
use indexlab_core::universe::{expand_daily_weights, select_top_weighted};

use super::{PipelineStep, StepContext, StepError, StepOutcome};

pub struct GenerateConstituents;

impl PipelineStep for GenerateConstituents {
    fn name(&self) -> &'static str {
        "generate_constituents"
    }

    fn run(&self, ctx: &mut StepContext) -> Result<StepOutcome, StepError> {
        let snapshots = ctx.store.load_weights()?;
        if snapshots.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no constituent snapshots".into(),
            });
        }

        let canonical = ctx.store.load_canonical()?;
        if canonical.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no canonical prices yet".into(),
            });
        }

        // Top-N selection applies per snapshot, not across the whole history.
        let mut by_rebalance: BTreeMap<NaiveDate, Vec<ConstituentWeight>> = BTreeMap::new();
        for row in snapshots {
            by_rebalance.entry(row.rebalance_date).or_default().push(row);
        }

        let mut selected = Vec::new();
        for rows in by_rebalance.values() {
            let top: BTreeSet<String> =
                select_top_weighted(rows, ctx.config.index.max_constituents)
                    .into_iter()
                    .collect();
            selected.extend(rows.iter().filter(|r| top.contains(&r.ticker)).cloned());
        }

        let trading_dates: Vec<NaiveDate> = canonical
            .iter()
            .map(|row| row.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let daily = expand_daily_weights(&selected, &trading_dates);
        if daily.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no overlap between snapshots and priced dates".into(),
            });
        }

        let dates = daily.iter().map(|w| w.date).collect::<BTreeSet<_>>().len();
        ctx.store.replace_daily_weights(&daily)?;

        Ok(StepOutcome::Completed {
            summary: format!("{} daily weights across {dates} dates", daily.len()),
        })
    }
}

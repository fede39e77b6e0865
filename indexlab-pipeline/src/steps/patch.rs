//! Step 2: audit coverage and forward-fill missing canonical prices.
//!
//! The audit runs on observed (non-imputed) coverage so earlier fills never
//! mask a recurring ingestion gap. Inferred holidays are expected
//! zero-activity days and are excluded from both the bad-day audit and the
//! fill targets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::{info, warn};

use indexlab_core::calendar::{
    build_coverage, evaluate_completeness, generate_weekdays, infer_holidays, AuditStatus,
};
use indexlab_core::constituents::weight_sums;
use indexlab_core::impute::{forward_fill, select_alert_candidates};

use super::{PipelineStep, StepContext, StepError, StepOutcome};

pub struct PatchMissingPrices;

impl PipelineStep for PatchMissingPrices {
    fn name(&self) -> &'static str {
        "patch_missing_prices"
    }

    fn run(&self, ctx: &mut StepContext) -> Result<StepOutcome, StepError> {
        let canonical = ctx.store.load_canonical()?;
        if canonical.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no canonical prices yet".into(),
            });
        }

        let snapshots = ctx.store.load_weights()?;
        let tickers: Vec<String> = snapshots
            .iter()
            .map(|w| w.ticker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if tickers.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no constituents found".into(),
            });
        }

        // Snapshot weights are not required to sum to 1.0; surface drift, don't reject.
        for (date, sum) in weight_sums(&snapshots) {
            if (sum - 1.0).abs() > 0.05 {
                warn!("snapshot {date} weights sum to {sum:.4}");
            }
        }

        let last_date = canonical
            .iter()
            .map(|row| row.date)
            .max()
            .expect("non-empty canonical");
        let weekdays = generate_weekdays(ctx.config.index.base_date, last_date);
        if weekdays.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no trading window before the last priced date".into(),
            });
        }

        let mut observed_counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for row in canonical.iter().filter(|row| !row.imputed) {
            *observed_counts.entry(row.date).or_insert(0) += 1;
        }

        let coverage = build_coverage(&weekdays, &observed_counts, tickers.len());
        let holidays = infer_holidays(&coverage, ctx.config.audit.holiday_coverage_threshold);
        let report = evaluate_completeness(
            &coverage,
            &holidays,
            ctx.config.audit.min_daily_coverage,
            ctx.config.audit.max_bad_days,
        );
        if report.status == AuditStatus::Fail {
            warn!(
                "completeness audit FAIL: {} unexplained gap days (max {})",
                report.bad_days.len(),
                ctx.config.audit.max_bad_days
            );
        }

        let expected: Vec<NaiveDate> = weekdays
            .iter()
            .copied()
            .filter(|date| !holidays.contains(date))
            .collect();

        let filled = forward_fill(&canonical, &expected, &tickers);
        ctx.store.upsert_canonical(&filled)?;

        for (ticker, date) in select_alert_candidates(&filled, ctx.config.impute.alert_cap) {
            warn!("imputed price for {ticker} on {date}");
        }
        if filled.len() > ctx.config.impute.alert_cap {
            info!(
                "{} further imputed cells not surfaced (alert cap {})",
                filled.len() - ctx.config.impute.alert_cap,
                ctx.config.impute.alert_cap
            );
        }

        Ok(StepOutcome::Completed {
            summary: format!(
                "{} gaps filled, {} holidays inferred, {} bad days, audit {:?}",
                filled.len(),
                holidays.len(),
                report.bad_days.len(),
                report.status,
            ),
        })
    }
}

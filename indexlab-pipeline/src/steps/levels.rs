//! Step 4: compute index levels with divisor continuity.
//!
//! The one step whose failure is fatal: without a base-date numerator no
//! divisor exists and no level can be computed at all. The index_levels
//! table is fully recomputed and replaced — re-running on unchanged upstream
//! data reproduces identical rows.

use indexlab_core::benchmark::calculate_levels;
use indexlab_core::universe::rebalance_dates;

use super::{PipelineStep, StepContext, StepError, StepOutcome};

pub struct CalculateIndexLevels;

impl PipelineStep for CalculateIndexLevels {
    fn name(&self) -> &'static str {
        "calculate_index_levels"
    }

    fn run(&self, ctx: &mut StepContext) -> Result<StepOutcome, StepError> {
        let daily_weights = ctx.store.load_daily_weights()?;
        if daily_weights.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no daily weights yet".into(),
            });
        }

        let canonical = ctx.store.load_canonical()?;
        if canonical.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no canonical prices yet".into(),
            });
        }

        let snapshots = ctx.store.load_weights()?;
        let rebalances = rebalance_dates(&snapshots);

        let levels = calculate_levels(
            &daily_weights,
            &canonical,
            &rebalances,
            &ctx.config.to_index_config(),
        )?;
        ctx.store.replace_levels(&levels)?;

        Ok(StepOutcome::Completed {
            summary: format!(
                "{} index levels from {} ({} rebalances)",
                levels.len(),
                ctx.config.index.base_date,
                rebalances.len(),
            ),
        })
    }
}

//! Step 5: derive daily returns for the index and every constituent.
//!
//! Both series land in the same returns table; the index chain is keyed by
//! the reserved `_INDEX_` ticker. Fully recomputed and replaced every run.

use indexlab_core::domain::INDEX_TICKER;
use indexlab_core::returns::{constituent_returns, index_returns};

use super::{PipelineStep, StepContext, StepError, StepOutcome};

pub struct CalculateReturns;

impl PipelineStep for CalculateReturns {
    fn name(&self) -> &'static str {
        "calculate_returns"
    }

    fn run(&self, ctx: &mut StepContext) -> Result<StepOutcome, StepError> {
        let levels = ctx.store.load_levels()?;
        let canonical = ctx.store.load_canonical()?;

        if levels.is_empty() && canonical.is_empty() {
            return Ok(StepOutcome::Skipped {
                reason: "no levels or prices yet".into(),
            });
        }

        let mut rows = index_returns(&levels);
        let index_count = rows.len();
        rows.extend(constituent_returns(&canonical));

        ctx.store.replace_returns(&rows)?;

        Ok(StepOutcome::Completed {
            summary: format!(
                "{} return rows ({index_count} {INDEX_TICKER}, {} constituent)",
                rows.len(),
                rows.len() - index_count,
            ),
        })
    }
}

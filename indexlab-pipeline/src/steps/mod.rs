//! Ordered pipeline steps and the coordinator.
//!
//! Each step reads from the persisted tables only, writes idempotently, and
//! reports `Skipped` (not failure) when its preconditions are empty — a cold
//! pipeline runs clean end to end. Steps execute strictly in sequence under
//! the cross-process lock; a failed step aborts the run, and the next run
//! safely re-derives whatever the failed run half-finished.

mod constituents;
mod ingest;
mod levels;
mod patch;
mod returns;

pub use constituents::GenerateConstituents;
pub use ingest::IngestPrices;
pub use levels::CalculateIndexLevels;
pub use patch::PatchMissingPrices;
pub use returns::CalculateReturns;

use std::fmt;
use std::time::Duration;

use log::info;
use thiserror::Error;

use indexlab_core::benchmark::IndexCalcError;
use indexlab_core::constituents::ConstituentsError;
use indexlab_core::provider::ProviderSet;
use indexlab_core::store::{StoreError, TableStore};

use crate::config::PipelineConfig;
use crate::lock::{LockError, PipelineLock};

/// Shared state handed to every step. Steps hold nothing between runs;
/// everything flows through the store.
pub struct StepContext {
    pub config: PipelineConfig,
    pub store: TableStore,
    pub providers: ProviderSet,
}

impl StepContext {
    pub fn new(config: PipelineConfig, providers: ProviderSet) -> Self {
        let store = TableStore::new(&config.data_dir);
        Self {
            config,
            store,
            providers,
        }
    }
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed { summary: String },
    Skipped { reason: String },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Completed { summary } => write!(f, "completed: {summary}"),
            StepOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Constituents(#[from] ConstituentsError),

    #[error(transparent)]
    IndexCalc(#[from] IndexCalcError),
}

/// Common contract for pipeline steps.
pub trait PipelineStep {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: &mut StepContext) -> Result<StepOutcome, StepError>;
}

/// The fixed step order. A plain list — steps are wired here, not discovered.
pub fn default_steps() -> Vec<Box<dyn PipelineStep>> {
    vec![
        Box::new(IngestPrices),
        Box::new(PatchMissingPrices),
        Box::new(GenerateConstituents),
        Box::new(CalculateIndexLevels),
        Box::new(CalculateReturns),
    ]
}

/// Per-step record of a finished run.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: &'static str,
    pub outcome: StepOutcome,
}

/// Everything a finished pipeline run reports.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline lock: {0}")]
    Lock(#[from] LockError),

    #[error("step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        source: StepError,
    },
}

/// Run every step in order under the cross-process lock.
///
/// The lock is held for the lifetime of the whole run and released on all
/// exit paths, including step failure.
pub fn run_pipeline(
    config: &PipelineConfig,
    providers: ProviderSet,
) -> Result<PipelineReport, PipelineError> {
    let _lock = PipelineLock::acquire(
        &config.lock_path(),
        Duration::from_secs(config.lock.wait_timeout_secs),
    )?;

    let mut ctx = StepContext::new(config.clone(), providers);
    let mut reports = Vec::new();

    for step in default_steps() {
        info!("step {} starting", step.name());
        match step.run(&mut ctx) {
            Ok(outcome) => {
                info!("step {} {outcome}", step.name());
                reports.push(StepReport {
                    name: step.name(),
                    outcome,
                });
            }
            Err(source) => {
                return Err(PipelineError::Step {
                    step: step.name(),
                    source,
                });
            }
        }
    }

    Ok(PipelineReport { steps: reports })
}

//! IndexLab Pipeline — batch orchestration of the index computation.
//!
//! Runs the ordered step list (ingest prices → patch missing prices →
//! generate constituents → calculate index levels → calculate returns) under
//! a cross-process lock. Every step reads persisted tables only and writes
//! idempotently, so a retried run after any failure converges to the same
//! end state.

pub mod config;
pub mod export;
pub mod lock;
pub mod steps;

pub use config::{ConfigError, PipelineConfig};
pub use lock::{LockError, PipelineLock};
pub use steps::{
    run_pipeline, PipelineError, PipelineReport, PipelineStep, StepContext, StepOutcome,
};

// Orchestrator: drives a run through Generating → Grading → Improving → Done.

pub mod config;
pub mod handlers;
pub mod improver;
pub mod orchestrator;
pub mod persist;
pub mod run;
pub mod stages;

use thiserror::Error;

use crate::corpus::CorpusError;
use crate::generation::GenerationError;
use crate::models::profile::ProfileError;

pub use config::PipelineConfig;
pub use orchestrator::{Pipeline, PipelineOutcome};
pub use persist::{PgRunSink, RunSink};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid requirement profile: {0}")]
    InvalidProfile(#[from] ProfileError),

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("run cancelled")]
    Cancelled,

    #[error("failed to persist run: {0}")]
    Persistence(String),

    #[error("pipeline internal error: {0}")]
    Internal(String),
}

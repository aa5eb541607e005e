// Generation stages: per-role bullets, cross-role stitching, summary, skill categories.
// All remote calls go through llm_client::GenerationProvider; every generated fact passes
// a GroundingValidator before it can reach a document.

pub mod dedup;
pub mod prompts;
pub mod relevance;
pub mod role_generator;
pub mod seniority;
pub mod skills;
pub mod stitcher;
pub mod summary;

use thiserror::Error;

use crate::llm_client::LlmError;

pub use role_generator::RoleGenerator;
pub use skills::SkillCategorizer;
pub use stitcher::{stitch, StitchConfig};
pub use summary::SummaryGenerator;

/// Hard failures only. Grounding rejections are records, not errors.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation provider failed: {0}")]
    Provider(#[from] LlmError),

    #[error("generation task failed: {0}")]
    Task(String),
}

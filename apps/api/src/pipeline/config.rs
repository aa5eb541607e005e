use serde::{Deserialize, Serialize};

use crate::generation::dedup::DedupConfig;
use crate::generation::relevance::RelevanceWeights;
use crate::generation::role_generator::{MAX_BULLETS_PER_ROLE, MIN_BULLETS_PER_ROLE};
use crate::grading::GradingPolicy;
use crate::models::document::WordBudget;
use crate::pipeline::PipelineError;

/// Upper bound on `max_improvement_passes` a caller may request.
pub const MAX_IMPROVEMENT_PASSES_LIMIT: u32 = 5;

/// Per-run knobs. Every field has a default, so a request may override any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub word_budget: WordBudget,
    /// Words reserved for the summary; bullets are stitched against `max - reserve`.
    pub summary_max_words: usize,
    pub bullets_per_role: usize,
    pub recent_role_floor: usize,
    pub other_role_floor: usize,
    pub dedup: DedupConfig,
    pub relevance: RelevanceWeights,
    pub grading: GradingPolicy,
    pub max_improvement_passes: u32,
    /// How many of the worst deficiencies one improvement pass acts on.
    pub improver_max_targets: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            word_budget: WordBudget { min: 450, max: 650 },
            summary_max_words: 60,
            bullets_per_role: 4,
            recent_role_floor: 2,
            other_role_floor: 1,
            dedup: DedupConfig::default(),
            relevance: RelevanceWeights::default(),
            grading: GradingPolicy::default(),
            max_improvement_passes: 2,
            improver_max_targets: 2,
        }
    }
}

impl PipelineConfig {
    pub fn bullet_budget(&self) -> usize {
        self.word_budget.max.saturating_sub(self.summary_max_words)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.word_budget.min > self.word_budget.max {
            return invalid(format!(
                "word_budget.min {} exceeds word_budget.max {}",
                self.word_budget.min, self.word_budget.max
            ));
        }
        if self.summary_max_words == 0 || self.summary_max_words >= self.word_budget.max {
            return invalid(format!(
                "summary_max_words must be between 1 and word_budget.max ({})",
                self.word_budget.max
            ));
        }
        if !(MIN_BULLETS_PER_ROLE..=MAX_BULLETS_PER_ROLE).contains(&self.bullets_per_role) {
            return invalid(format!(
                "bullets_per_role must be within {MIN_BULLETS_PER_ROLE}..={MAX_BULLETS_PER_ROLE}"
            ));
        }
        if self.max_improvement_passes > MAX_IMPROVEMENT_PASSES_LIMIT {
            return invalid(format!(
                "max_improvement_passes must be at most {MAX_IMPROVEMENT_PASSES_LIMIT}"
            ));
        }
        if self.improver_max_targets == 0 {
            return invalid("improver_max_targets must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.dedup.min_pattern_similarity) {
            return invalid("dedup.min_pattern_similarity must be within 0..=1".to_string());
        }
        let w = &self.relevance;
        if [w.competency, w.required, w.nice_to_have]
            .iter()
            .any(|x| !x.is_finite() || *x < 0.0)
        {
            return invalid("relevance weights must be non-negative numbers".to_string());
        }
        self.grading.validate().map_err(PipelineError::InvalidConfig)
    }
}

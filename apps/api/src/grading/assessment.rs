//! Optional model-based seniority assessment, run in deterministic mode.
//! Any failure reads as "no opinion" and the grader keeps its heuristic.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::generation::prompts::SENIORITY_ASSESSMENT_PROMPT_TEMPLATE;
use crate::llm_client::prompts::{bullet_list, JSON_ONLY_SYSTEM};
use crate::llm_client::{GenerationConstraints, GenerationProvider, GenerationTask, PromptContext};
use crate::models::document::StitchedDocument;
use crate::models::profile::RequirementProfile;
use crate::models::role_block::RoleBlock;

#[derive(Clone)]
pub struct SeniorityAssessor {
    provider: Arc<dyn GenerationProvider>,
}

impl SeniorityAssessor {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    /// 0–100 when the model returned a usable `{score, rationale}`, otherwise `None`.
    pub async fn assess(
        &self,
        document: &StitchedDocument,
        roles: &[RoleBlock],
        profile: &RequirementProfile,
    ) -> Option<f64> {
        if document.bullets().next().is_none() {
            return None;
        }
        let titles: Vec<&str> = roles
            .iter()
            .map(|r| r.title.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect();
        let prompt = SENIORITY_ASSESSMENT_PROMPT_TEMPLATE
            .replace("{role_category}", profile.role_category.label())
            .replace("{titles}", &bullet_list(titles))
            .replace(
                "{bullets}",
                &bullet_list(document.bullets().map(|b| b.text.as_str())),
            );
        let context = PromptContext {
            system: JSON_ONLY_SYSTEM.to_string(),
            prompt,
        };
        let constraints = GenerationConstraints::deterministic_json(GenerationTask::SeniorityAssessment);

        let output = match self.provider.generate(&context, &constraints).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Seniority assessment failed, using heuristic");
                return None;
            }
        };

        let score = output
            .structured
            .as_ref()
            .and_then(|v| v.get("score"))
            .and_then(|s| s.as_f64())
            .filter(|s| (0.0..=100.0).contains(s));
        match score {
            Some(score) => {
                debug!(score, "Seniority assessment");
                Some(score)
            }
            None => {
                warn!("Seniority assessment was malformed, using heuristic");
                None
            }
        }
    }
}

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::generation::role_generator::RoleRequest;
use crate::generation::stitcher::note_shortfall;
use crate::generation::summary::SummaryGround;
use crate::generation::{stitch, GenerationError, RoleGenerator, SkillCategorizer, StitchConfig, SummaryGenerator};
use crate::grading::GradeInput;
use crate::grounding::GroundingValidator;
use crate::llm_client::GenerationProvider;
use crate::models::document::StitchedDocument;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::run::PipelineRun;

/// The generation stages a run is built from, configured for one run.
pub struct Stages {
    roles: RoleGenerator,
    summary: SummaryGenerator,
    skills: SkillCategorizer,
    config: PipelineConfig,
}

impl Stages {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        validator: Arc<dyn GroundingValidator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            roles: RoleGenerator::new(
                Arc::clone(&provider),
                Arc::clone(&validator),
                config.relevance.clone(),
            ),
            summary: SummaryGenerator::new(Arc::clone(&provider), validator),
            skills: SkillCategorizer::new(provider),
            config,
        }
    }

    /// (Re)generates the given roles using each role's current request.
    ///
    /// With `keep_existing_on_empty`, a role that yields no accepted bullet keeps its
    /// previous list. Returns how many roles had their bullets replaced.
    pub async fn generate_roles(
        &self,
        run: &mut PipelineRun,
        role_ids: &[Uuid],
        keep_existing_on_empty: bool,
    ) -> Result<usize, GenerationError> {
        let jobs: Vec<_> = run
            .roles
            .iter()
            .filter(|r| role_ids.contains(&r.role_id))
            .map(|r| {
                let request = run
                    .role_requests
                    .get(&r.role_id)
                    .cloned()
                    .unwrap_or_else(|| RoleRequest::new(self.config.bullets_per_role));
                (r.clone(), request)
            })
            .collect();
        if jobs.is_empty() {
            return Ok(0);
        }

        let outputs = self
            .roles
            .generate_all(jobs, Arc::clone(&run.profile), Arc::clone(&run.watched_terms))
            .await?;

        let mut replaced = 0;
        for output in outputs {
            if run.absorb_role_output(output, keep_existing_on_empty) {
                replaced += 1;
            }
        }
        Ok(replaced)
    }

    /// Regenerates the summary and/or skill categories, concurrently when both are asked for.
    pub async fn refresh_summary_and_skills(
        &self,
        run: &mut PipelineRun,
        summary: bool,
        skills: bool,
    ) -> Result<(), GenerationError> {
        let ground = SummaryGround {
            facts: &run.facts,
            skill_union: &run.skill_union,
            watched_terms: &run.watched_terms,
            max_words: self.config.summary_max_words,
        };
        let summary_fut = async {
            if summary {
                self.summary.generate(&ground, &run.profile).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let skills_fut = async {
            if skills {
                self.skills
                    .categorize(&run.skill_union, &run.profile)
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };
        let (summary_outcome, skills_outcome) = tokio::try_join!(summary_fut, skills_fut)?;

        if let Some(outcome) = summary_outcome {
            debug!(source = ?outcome.source, calls = outcome.provider_calls, "Summary refreshed");
            run.summary = outcome.text;
            run.summary_source = Some(outcome.source);
            run.violations.extend(outcome.violations);
        }
        if let Some(outcome) = skills_outcome {
            debug!(
                generated = outcome.categories.is_generated(),
                calls = outcome.provider_calls,
                "Skill categories refreshed"
            );
            run.skill_categories = outcome.categories;
            run.violations.extend(outcome.violations);
        }
        Ok(())
    }

    /// Stitches the run's current material into a document.
    pub fn assemble(&self, run: &PipelineRun) -> StitchedDocument {
        let stitch_config = StitchConfig {
            bullet_budget: run.bullet_budget,
            recent_role_floor: self.config.recent_role_floor,
            other_role_floor: self.config.other_role_floor,
            dedup: self.config.dedup.clone(),
        };
        let mut document = stitch(&run.roles, &run.bullets, &run.excluded_bullets, &stitch_config);
        document.skill_categories = run.skill_categories.clone();
        let mut document = document.with_summary(run.summary.clone());
        note_shortfall(&mut document, self.config.word_budget.min);
        document
    }

    pub fn grade_input<'a>(&self, run: &'a PipelineRun, document: &'a StitchedDocument) -> GradeInput<'a> {
        GradeInput {
            document,
            roles: &run.roles,
            profile: &run.profile,
            facts: &run.facts,
            skill_union: &run.skill_union,
            watched_terms: &run.watched_terms,
            budget: self.config.word_budget,
            grounding_violations: &run.violations,
            iteration: run.iteration_count,
        }
    }
}

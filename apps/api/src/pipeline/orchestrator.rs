//! Drives one generation run:
//! `Generating → Grading → (pass) Done | (fail, passes left) Improving → Grading |
//! (fail, passes spent) DoneWithWarnings`.
//!
//! Runs share nothing mutable. Cancellation is checked at stage boundaries only.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::corpus::{load_corpus, CorpusStore};
use crate::generation::role_generator::RoleGenState;
use crate::generation::summary::SummarySource;
use crate::grading::{Grader, SeniorityAssessor};
use crate::grounding::GroundingValidator;
use crate::llm_client::GenerationProvider;
use crate::models::document::StitchedDocument;
use crate::models::grade::{Dimension, GradeReport, GroundingViolation};
use crate::models::profile::RequirementProfile;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::improver::{self, ImprovementPlan};
use crate::pipeline::persist::RunSink;
use crate::pipeline::run::{PipelineRun, RunState, StateTransition};
use crate::pipeline::stages::Stages;
use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Done,
    DoneWithWarnings,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Done => "done",
            RunStatus::DoneWithWarnings => "done_with_warnings",
        }
    }
}

/// Everything that happened in a run, kept alongside the surfaced document.
#[derive(Debug, Clone, Serialize)]
pub struct AuditTrail {
    pub transitions: Vec<StateTransition>,
    pub role_states: BTreeMap<Uuid, RoleGenState>,
    /// Every grading of the run, in order.
    pub grade_reports: Vec<GradeReport>,
    pub grounding_violations: Vec<GroundingViolation>,
    pub improvements: Vec<ImprovementPlan>,
    pub summary_source: Option<SummarySource>,
    pub role_generation_calls: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub candidate_id: Uuid,
    pub document: StitchedDocument,
    /// Report for `document`. On `DoneWithWarnings` its deficiencies are what remained.
    pub report: GradeReport,
    pub iteration_count: u32,
    pub status: RunStatus,
    pub audit_trail: AuditTrail,
}

#[derive(Clone)]
pub struct Pipeline {
    corpus: Arc<dyn CorpusStore>,
    provider: Arc<dyn GenerationProvider>,
    validator: Arc<dyn GroundingValidator>,
    sink: Option<Arc<dyn RunSink>>,
}

fn ensure_live(cancel: &watch::Receiver<bool>) -> Result<(), PipelineError> {
    if *cancel.borrow() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

impl Pipeline {
    pub fn new(
        corpus: Arc<dyn CorpusStore>,
        provider: Arc<dyn GenerationProvider>,
        validator: Arc<dyn GroundingValidator>,
    ) -> Self {
        Self {
            corpus,
            provider,
            validator,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RunSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub async fn generate_document(
        &self,
        candidate_id: Uuid,
        profile: RequirementProfile,
        config: PipelineConfig,
    ) -> Result<PipelineOutcome, PipelineError> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.generate_document_with_cancel(candidate_id, profile, config, cancel_rx)
            .await
    }

    /// Same as `generate_document`, abandoning the run once `cancel` reads `true` at the
    /// next stage boundary.
    #[instrument(skip_all, fields(candidate_id = %candidate_id))]
    pub async fn generate_document_with_cancel(
        &self,
        candidate_id: Uuid,
        profile: RequirementProfile,
        config: PipelineConfig,
        cancel: watch::Receiver<bool>,
    ) -> Result<PipelineOutcome, PipelineError> {
        profile.validate()?;
        config.validate()?;

        let roles = load_corpus(self.corpus.as_ref(), candidate_id).await?;
        ensure_live(&cancel)?;

        let mut run = PipelineRun::new(
            candidate_id,
            profile,
            roles,
            config.bullets_per_role,
            config.bullet_budget(),
            Utc::now().date_naive(),
        );
        info!(
            run_id = %run.run_id,
            roles = run.roles.len(),
            skills = run.skill_union.len(),
            max_passes = config.max_improvement_passes,
            grounding = self.validator.name(),
            "Starting generation run"
        );

        let stages = Stages::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.validator),
            config.clone(),
        );
        let grader = Grader::new(
            Arc::clone(&self.validator),
            SeniorityAssessor::new(Arc::clone(&self.provider)),
            config.grading.clone(),
        );

        // Generating
        let role_ids: Vec<Uuid> = run.roles.iter().map(|r| r.role_id).collect();
        stages.generate_roles(&mut run, &role_ids, false).await?;
        ensure_live(&cancel)?;
        stages.refresh_summary_and_skills(&mut run, true, true).await?;
        ensure_live(&cancel)?;
        run.transition(RunState::Grading, "initial generation complete")?;

        let mut improvements = Vec::new();
        let (status, document, report) = loop {
            let document = stages.assemble(&run);
            let report = grader.grade(&stages.grade_input(&run, &document)).await;
            run.record_grade(&document, report.clone());

            if report.pass {
                run.transition(
                    RunState::Done,
                    format!("passed with composite {:.1}", report.composite_score),
                )?;
                break (RunStatus::Done, document, report);
            }

            if run.iteration_count >= config.max_improvement_passes {
                run.transition(
                    RunState::DoneWithWarnings,
                    format!(
                        "still failing after {} improvement passes",
                        run.iteration_count
                    ),
                )?;
                let (best_document, best_report) =
                    run.best().cloned().unwrap_or((document, report));
                let below_floor: Vec<Dimension> =
                    best_report.floor_violations().map(|d| d.dimension).collect();
                warn!(
                    run_id = %run.run_id,
                    composite = best_report.composite_score,
                    deficiencies = best_report.deficiencies.len(),
                    below_floor = ?below_floor,
                    "Surfacing best candidate with warnings"
                );
                break (RunStatus::DoneWithWarnings, best_document, best_report);
            }

            ensure_live(&cancel)?;
            run.transition(
                RunState::Improving,
                format!("{} deficiencies", report.deficiencies.len()),
            )?;
            let plan = ImprovementPlan::from_report(&report, &run, config.improver_max_targets);
            improver::apply(&stages, &mut run, &plan).await?;
            improvements.push(plan);
            run.iteration_count += 1;
            ensure_live(&cancel)?;
            run.transition(RunState::Grading, "improvement pass applied")?;
        };
        debug_assert!(run.state.is_terminal());

        let outcome = PipelineOutcome {
            run_id: run.run_id,
            candidate_id,
            iteration_count: run.iteration_count,
            status,
            audit_trail: AuditTrail {
                transitions: run.transitions,
                role_states: run.role_states,
                grade_reports: run.reports,
                grounding_violations: run.violations,
                improvements,
                summary_source: run.summary_source,
                role_generation_calls: run.role_generation_calls,
            },
            document,
            report,
        };

        info!(
            run_id = %outcome.run_id,
            status = outcome.status.as_str(),
            iterations = outcome.iteration_count,
            composite = outcome.report.composite_score,
            words = outcome.document.total_word_count,
            "Generation run finished"
        );

        if let Some(sink) = &self.sink {
            sink.persist(&outcome)
                .await
                .map_err(|e| PipelineError::Persistence(format!("{e:#}")))?;
        }
        Ok(outcome)
    }
}

//! Per-generation run state. Owned by one orchestrator call and dropped after handoff.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::generation::role_generator::{RoleGenState, RoleOutput, RoleRequest};
use crate::generation::summary::{AggregateFacts, SummarySource};
use crate::grounding::lexicon;
use crate::models::document::{GeneratedBullet, SkillCategories, StitchedDocument};
use crate::models::grade::{GradeReport, GroundingViolation};
use crate::models::profile::RequirementProfile;
use crate::models::role_block::{skill_union, RoleBlock};
use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Generating,
    Grading,
    Improving,
    Done,
    DoneWithWarnings,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Generating, RunState::Grading)
                | (RunState::Grading, RunState::Done)
                | (RunState::Grading, RunState::Improving)
                | (RunState::Grading, RunState::DoneWithWarnings)
                | (RunState::Improving, RunState::Grading)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::DoneWithWarnings)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub from: RunState,
    pub to: RunState,
    pub iteration: u32,
    pub note: String,
    pub at: DateTime<Utc>,
}

pub struct PipelineRun {
    pub run_id: Uuid,
    pub candidate_id: Uuid,
    pub profile: Arc<RequirementProfile>,
    /// Recency-ordered.
    pub roles: Vec<RoleBlock>,
    pub skill_union: BTreeSet<String>,
    pub watched_terms: Arc<BTreeSet<String>>,
    pub facts: AggregateFacts,
    pub role_requests: HashMap<Uuid, RoleRequest>,
    pub role_states: BTreeMap<Uuid, RoleGenState>,
    pub bullets: HashMap<Uuid, Vec<GeneratedBullet>>,
    pub excluded_bullets: HashSet<Uuid>,
    pub bullet_budget: usize,
    pub summary: String,
    pub summary_source: Option<SummarySource>,
    pub skill_categories: SkillCategories,
    pub violations: Vec<GroundingViolation>,
    pub reports: Vec<GradeReport>,
    pub iteration_count: u32,
    pub role_generation_calls: u32,
    pub state: RunState,
    pub transitions: Vec<StateTransition>,
    best: Option<(StitchedDocument, GradeReport)>,
}

impl PipelineRun {
    pub fn new(
        candidate_id: Uuid,
        profile: RequirementProfile,
        roles: Vec<RoleBlock>,
        bullets_per_role: usize,
        bullet_budget: usize,
        as_of: NaiveDate,
    ) -> Self {
        let skill_union = skill_union(&roles);
        let watched = lexicon::watched_terms(&skill_union, &profile);
        let facts = AggregateFacts::from_roles(&roles, as_of);
        let role_requests = roles
            .iter()
            .map(|r| (r.role_id, RoleRequest::new(bullets_per_role)))
            .collect();
        let role_states = roles
            .iter()
            .map(|r| (r.role_id, RoleGenState::Pending))
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            candidate_id,
            profile: Arc::new(profile),
            roles,
            skill_union,
            watched_terms: Arc::new(watched),
            facts,
            role_requests,
            role_states,
            bullets: HashMap::new(),
            excluded_bullets: HashSet::new(),
            bullet_budget,
            summary: String::new(),
            summary_source: None,
            skill_categories: SkillCategories::default(),
            violations: Vec::new(),
            reports: Vec::new(),
            iteration_count: 0,
            role_generation_calls: 0,
            state: RunState::Generating,
            transitions: Vec::new(),
            best: None,
        }
    }

    pub fn transition(&mut self, to: RunState, note: impl Into<String>) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(to) {
            return Err(PipelineError::Internal(format!(
                "illegal run transition {:?} -> {:?}",
                self.state, to
            )));
        }
        let note = note.into();
        debug!(run_id = %self.run_id, from = ?self.state, to = ?to, note = %note, "Run transition");
        self.transitions.push(StateTransition {
            from: self.state,
            to,
            iteration: self.iteration_count,
            note,
            at: Utc::now(),
        });
        self.state = to;
        Ok(())
    }

    /// Folds a role's generation output into the run.
    ///
    /// With `keep_existing_on_empty`, a regeneration that produced nothing leaves the
    /// role's previous bullets in place.
    pub fn absorb_role_output(&mut self, output: RoleOutput, keep_existing_on_empty: bool) -> bool {
        self.role_generation_calls += output.provider_calls;
        self.violations.extend(output.violations);
        self.role_states.insert(output.role_id, output.state);

        let has_existing = self
            .bullets
            .get(&output.role_id)
            .map(|b| !b.is_empty())
            .unwrap_or(false);
        if output.bullets.is_empty() && keep_existing_on_empty && has_existing {
            return false;
        }
        self.bullets.insert(output.role_id, output.bullets);
        true
    }

    pub fn record_grade(&mut self, document: &StitchedDocument, report: GradeReport) {
        let better = self
            .best
            .as_ref()
            .map(|(_, best)| report.composite_score >= best.composite_score)
            .unwrap_or(true);
        if better {
            self.best = Some((document.clone(), report.clone()));
        }
        self.reports.push(report);
    }

    /// Highest-composite graded document; later ties win.
    pub fn best(&self) -> Option<&(StitchedDocument, GradeReport)> {
        self.best.as_ref()
    }

    pub fn role(&self, role_id: Uuid) -> Option<&RoleBlock> {
        self.roles.iter().find(|r| r.role_id == role_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture_profile, fixture_role};

    fn run() -> PipelineRun {
        PipelineRun::new(
            Uuid::new_v4(),
            fixture_profile(),
            vec![fixture_role("Acme", &["AWS"], &["Built things on AWS"])],
            4,
            590,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    #[test]
    fn test_legal_transitions_only() {
        let mut run = run();
        assert!(run.transition(RunState::Improving, "skip").is_err());
        run.transition(RunState::Grading, "generated").unwrap();
        run.transition(RunState::Improving, "failed").unwrap();
        run.transition(RunState::Grading, "improved").unwrap();
        run.transition(RunState::DoneWithWarnings, "budget spent").unwrap();
        assert!(run.state.is_terminal());
        assert_eq!(run.transitions.len(), 4);
        assert!(run.transition(RunState::Grading, "again").is_err());
    }

    #[test]
    fn test_watched_terms_include_profile_corpus_and_lexicon() {
        let run = run();
        assert!(run.watched_terms.contains("AWS"));
        assert!(run.watched_terms.contains("Kubernetes"));
        assert!(run.watched_terms.contains("Terraform"));
        assert!(run.watched_terms.contains("GCP"));
    }

    #[test]
    fn test_empty_regeneration_keeps_previous_bullets() {
        let mut run = run();
        let role_id = run.roles[0].role_id;
        let bullet = GeneratedBullet {
            bullet_id: Uuid::new_v4(),
            role_id,
            text: "Built things on AWS".to_string(),
            cited_skills: vec!["AWS".to_string()],
            estimated_word_count: 4,
            relevance_score: 0.4,
            attempt: 1,
        };
        run.bullets.insert(role_id, vec![bullet]);
        let empty = RoleOutput {
            role_id,
            state: RoleGenState::Degraded,
            bullets: vec![],
            violations: vec![],
            transitions: vec![],
            provider_calls: 2,
        };
        assert!(!run.absorb_role_output(empty, true));
        assert_eq!(run.bullets[&role_id].len(), 1);
        assert_eq!(run.role_generation_calls, 2);
    }
}

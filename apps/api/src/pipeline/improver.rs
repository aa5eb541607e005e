//! Improver: turns the worst deficiencies of a failed grade into one targeted pass.
//!
//! Planning is pure; `apply` performs it. Only deficiencies present in the report are
//! acted on, so a dimension that met its target is never touched.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::generation::role_generator::{RoleRequest, MAX_BULLETS_PER_ROLE, MIN_BULLETS_PER_ROLE};
use crate::generation::GenerationError;
use crate::grading::grader::role_supports;
use crate::models::grade::{Dimension, GradeReport, Remedy};
use crate::pipeline::run::PipelineRun;
use crate::pipeline::stages::Stages;

/// One improvement pass, as planned and recorded in the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImprovementPlan {
    pub iteration: u32,
    pub targeted: Vec<Dimension>,
    /// Roles to regenerate with their updated requests.
    pub role_requests: BTreeMap<Uuid, RoleRequest>,
    pub restitch_budget: Option<usize>,
    pub drop_bullets: BTreeSet<Uuid>,
    pub regenerate_summary: bool,
    pub regenerate_skills: bool,
    /// Targeted dimensions the corpus cannot fix.
    pub unresolvable: Vec<Dimension>,
}

impl ImprovementPlan {
    pub fn from_report(report: &GradeReport, run: &PipelineRun, max_targets: usize) -> Self {
        let mut plan = ImprovementPlan {
            iteration: run.iteration_count + 1,
            ..Default::default()
        };

        // Deficiencies with nothing actionable don't use up a target slot.
        let actionable = |remedies: &[Remedy]| remedies.iter().any(|r| !matches!(r, Remedy::Unresolvable));
        for deficiency in &report.deficiencies {
            if !actionable(&deficiency.remedies) {
                plan.unresolvable.push(deficiency.dimension);
            }
        }

        for deficiency in report
            .deficiencies
            .iter()
            .filter(|d| actionable(&d.remedies))
            .take(max_targets)
        {
            plan.targeted.push(deficiency.dimension);
            for remedy in &deficiency.remedies {
                plan.add_remedy(remedy, run);
            }
        }
        plan
    }

    fn request_for<'a>(&'a mut self, run: &PipelineRun, role_id: Uuid) -> &'a mut RoleRequest {
        self.role_requests.entry(role_id).or_insert_with(|| {
            run.role_requests
                .get(&role_id)
                .cloned()
                .unwrap_or_else(|| RoleRequest::new(MIN_BULLETS_PER_ROLE))
        })
    }

    fn add_remedy(&mut self, remedy: &Remedy, run: &PipelineRun) {
        match remedy {
            Remedy::RegenerateRoles {
                role_ids,
                priority_keywords,
            } => {
                for &role_id in role_ids {
                    let Some(role) = run.role(role_id) else {
                        continue;
                    };
                    let supported: Vec<String> = priority_keywords
                        .iter()
                        .filter(|k| role_supports(role, k))
                        .cloned()
                        .collect();
                    let request = self.request_for(run, role_id);
                    for keyword in supported {
                        if !request.priority_keywords.contains(&keyword) {
                            request.priority_keywords.push(keyword);
                        }
                    }
                }
            }
            Remedy::ExpandRoles { role_ids } => {
                for &role_id in role_ids {
                    if run.role(role_id).is_none() {
                        continue;
                    }
                    let request = self.request_for(run, role_id);
                    request.bullets_wanted = (request.bullets_wanted + 1).min(MAX_BULLETS_PER_ROLE);
                }
            }
            Remedy::EmphasizeSeniority { role_ids } => {
                for &role_id in role_ids {
                    if run.role(role_id).is_none() {
                        continue;
                    }
                    self.request_for(run, role_id).emphasize_seniority = true;
                }
            }
            Remedy::Restitch { bullet_budget } => {
                let tighter = self.restitch_budget.map_or(*bullet_budget, |b| b.min(*bullet_budget));
                self.restitch_budget = Some(tighter);
            }
            Remedy::DropBullets { bullet_ids } => {
                self.drop_bullets.extend(bullet_ids.iter().copied());
            }
            Remedy::RegenerateSummary => self.regenerate_summary = true,
            Remedy::RegenerateSkillCategories => self.regenerate_skills = true,
            Remedy::Unresolvable => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.role_requests.is_empty()
            && self.restitch_budget.is_none()
            && self.drop_bullets.is_empty()
            && !self.regenerate_summary
            && !self.regenerate_skills
    }
}

/// Performs `plan` against `run`. Regenerated roles keep their old bullets when the new
/// attempt accepted nothing.
pub async fn apply(stages: &Stages, run: &mut PipelineRun, plan: &ImprovementPlan) -> Result<(), GenerationError> {
    if plan.is_empty() {
        info!(
            run_id = %run.run_id,
            iteration = plan.iteration,
            unresolvable = ?plan.unresolvable,
            "Nothing actionable in this improvement pass"
        );
        return Ok(());
    }

    if !plan.role_requests.is_empty() {
        for (role_id, request) in &plan.role_requests {
            run.role_requests.insert(*role_id, request.clone());
        }
        let role_ids: Vec<Uuid> = plan.role_requests.keys().copied().collect();
        let replaced = stages.generate_roles(run, &role_ids, true).await?;
        info!(
            run_id = %run.run_id,
            iteration = plan.iteration,
            requested = role_ids.len(),
            replaced,
            "Regenerated roles"
        );
    }

    run.excluded_bullets.extend(plan.drop_bullets.iter().copied());
    if let Some(budget) = plan.restitch_budget {
        run.bullet_budget = budget;
    }

    if plan.regenerate_summary || plan.regenerate_skills {
        stages
            .refresh_summary_and_skills(run, plan.regenerate_summary, plan.regenerate_skills)
            .await?;
    }

    info!(
        run_id = %run.run_id,
        iteration = plan.iteration,
        targeted = ?plan.targeted,
        bullet_budget = run.bullet_budget,
        dropped = plan.drop_bullets.len(),
        summary = plan.regenerate_summary,
        skills = plan.regenerate_skills,
        "Improvement pass applied"
    );
    Ok(())
}

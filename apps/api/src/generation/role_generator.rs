//! Per-role bullet generation with a grounding gate.
//!
//! Each role runs a bounded two-attempt machine:
//! `Pending → (clean) Accepted | (rejected) RejectedOnce → (clean) Accepted | Degraded`.
//! Rejected bullets are discarded, never edited. A degraded role keeps whatever was
//! accepted across both attempts, possibly nothing.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::generation::prompts::{
    PRIORITY_KEYWORDS_TEMPLATE, REGENERATION_FEEDBACK_TEMPLATE, ROLE_BULLETS_PROMPT_TEMPLATE,
    ROLE_BULLETS_SYSTEM, SENIORITY_EMPHASIS,
};
use crate::generation::relevance::{score_relevance, RelevanceWeights};
use crate::generation::seniority::lens_for;
use crate::generation::GenerationError;
use crate::grounding::{Candidate, GroundingValidator, SourceFacts};
use crate::llm_client::prompts::{bullet_list, GROUNDING_INSTRUCTION, SKILL_CITATION_INSTRUCTION};
use crate::llm_client::{GenerationConstraints, GenerationOutput, GenerationProvider, GenerationTask, PromptContext};
use crate::models::document::{word_count, GeneratedBullet};
use crate::models::grade::{GroundingViolation, ViolationStage};
use crate::models::profile::RequirementProfile;
use crate::models::role_block::RoleBlock;

pub const MIN_BULLETS_PER_ROLE: usize = 3;
pub const MAX_BULLETS_PER_ROLE: usize = 6;

/// What to ask of one role's generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleRequest {
    pub bullets_wanted: usize,
    /// Keywords the source supports but the previous draft missed.
    pub priority_keywords: Vec<String>,
    pub emphasize_seniority: bool,
}

impl RoleRequest {
    pub fn new(bullets_wanted: usize) -> Self {
        Self {
            bullets_wanted: bullets_wanted.clamp(MIN_BULLETS_PER_ROLE, MAX_BULLETS_PER_ROLE),
            priority_keywords: Vec::new(),
            emphasize_seniority: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleGenState {
    Pending,
    RejectedOnce,
    Accepted,
    Degraded,
}

impl RoleGenState {
    /// Next state after an attempt. `clean` means no rejection, no malformed output, and
    /// at least one bullet.
    pub fn advance(self, clean: bool) -> Self {
        match (self, clean) {
            (RoleGenState::Pending, true) | (RoleGenState::RejectedOnce, true) => {
                RoleGenState::Accepted
            }
            (RoleGenState::Pending, false) => RoleGenState::RejectedOnce,
            (RoleGenState::RejectedOnce, false) => RoleGenState::Degraded,
            (terminal, _) => terminal,
        }
    }

    /// Attempt number the state is about to run (1 or 2). Terminal states run none.
    pub fn attempt(self) -> Option<u8> {
        match self {
            RoleGenState::Pending => Some(1),
            RoleGenState::RejectedOnce => Some(2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleOutput {
    pub role_id: Uuid,
    pub state: RoleGenState,
    /// Accepted bullets, relevance order, at most `bullets_wanted`.
    pub bullets: Vec<GeneratedBullet>,
    pub violations: Vec<GroundingViolation>,
    pub transitions: Vec<RoleGenState>,
    pub provider_calls: u32,
}

impl RoleOutput {
    fn without_source(role_id: Uuid) -> Self {
        Self {
            role_id,
            state: RoleGenState::Degraded,
            bullets: Vec::new(),
            violations: Vec::new(),
            transitions: vec![RoleGenState::Pending, RoleGenState::Degraded],
            provider_calls: 0,
        }
    }
}

/// Raw model shape before grounding.
#[derive(Debug, Clone, Deserialize)]
struct DraftBullet {
    text: String,
    #[serde(default)]
    cited_skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DraftEnvelope {
    bullets: Vec<DraftBullet>,
}

/// Accepts a bare array or `{ "bullets": [...] }`.
fn parse_drafts(output: &GenerationOutput) -> Result<Vec<DraftBullet>, String> {
    let value = output
        .structured
        .clone()
        .ok_or_else(|| "output was not valid JSON".to_string())?;
    let drafts = if value.is_array() {
        serde_json::from_value::<Vec<DraftBullet>>(value)
    } else {
        serde_json::from_value::<DraftEnvelope>(value).map(|e| e.bullets)
    }
    .map_err(|e| format!("output did not match the bullet schema: {e}"))?;

    if drafts.is_empty() {
        return Err("output contained no bullets".to_string());
    }
    Ok(drafts)
}

#[derive(Clone)]
pub struct RoleGenerator {
    provider: Arc<dyn GenerationProvider>,
    validator: Arc<dyn GroundingValidator>,
    weights: RelevanceWeights,
}

impl RoleGenerator {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        validator: Arc<dyn GroundingValidator>,
        weights: RelevanceWeights,
    ) -> Self {
        Self {
            provider,
            validator,
            weights,
        }
    }

    /// Runs every job concurrently. Output order matches input order.
    ///
    /// Grounding failures never fail the batch; only a provider error that outlived the
    /// client's retries does.
    pub async fn generate_all(
        &self,
        jobs: Vec<(RoleBlock, RoleRequest)>,
        profile: Arc<RequirementProfile>,
        watched_terms: Arc<BTreeSet<String>>,
    ) -> Result<Vec<RoleOutput>, GenerationError> {
        let total = jobs.len();
        let mut join_set = JoinSet::new();
        for (idx, (role, request)) in jobs.into_iter().enumerate() {
            let generator = self.clone();
            let profile = Arc::clone(&profile);
            let watched = Arc::clone(&watched_terms);
            join_set.spawn(async move {
                let output = generator
                    .generate_role(&role, &profile, &watched, &request)
                    .await?;
                Ok::<(usize, RoleOutput), GenerationError>((idx, output))
            });
        }

        let mut ordered: Vec<Option<RoleOutput>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            let (idx, output) =
                joined.map_err(|e| GenerationError::Task(format!("role task join error: {e}")))??;
            ordered[idx] = Some(output);
        }

        ordered
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.ok_or_else(|| GenerationError::Task(format!("missing output for role job {idx}")))
            })
            .collect()
    }

    pub async fn generate_role(
        &self,
        role: &RoleBlock,
        profile: &RequirementProfile,
        watched_terms: &BTreeSet<String>,
        request: &RoleRequest,
    ) -> Result<RoleOutput, GenerationError> {
        if !role.has_achievements() {
            info!(
                role_id = %role.role_id,
                employer = %role.employer,
                "Role has no achievements, degrading without generation"
            );
            return Ok(RoleOutput::without_source(role.role_id));
        }

        let source_text = role.source_text();
        let facts = SourceFacts {
            skill_tags: &role.skill_tags,
            source_text: &source_text,
            watched_terms,
        };

        let mut state = RoleGenState::Pending;
        let mut transitions = vec![state];
        let mut accepted: Vec<GeneratedBullet> = Vec::new();
        let mut violations = Vec::new();
        let mut feedback: Vec<String> = Vec::new();
        let mut provider_calls = 0u32;

        while let Some(attempt) = state.attempt() {
            let context = PromptContext {
                system: ROLE_BULLETS_SYSTEM.to_string(),
                prompt: build_role_prompt(role, profile, request, &feedback),
            };
            let constraints = GenerationConstraints::narrative_json(GenerationTask::RoleBullets)
                .for_role(role.role_id);

            provider_calls += 1;
            let output = self.provider.generate(&context, &constraints).await?;

            let mut reasons: Vec<String> = Vec::new();
            let mut accepted_this_attempt = 0usize;
            match parse_drafts(&output) {
                Ok(drafts) => {
                    for draft in drafts {
                        let result = self.validator.validate(
                            &Candidate {
                                text: &draft.text,
                                cited_skills: &draft.cited_skills,
                            },
                            &facts,
                        );
                        if result.accepted() {
                            accepted_this_attempt += 1;
                            let relevance = score_relevance(
                                &draft.text,
                                &result.canonical_skills,
                                profile,
                                &self.weights,
                            );
                            accepted.push(GeneratedBullet {
                                bullet_id: Uuid::new_v4(),
                                role_id: role.role_id,
                                estimated_word_count: word_count(&draft.text),
                                text: draft.text.trim().to_string(),
                                cited_skills: result.canonical_skills,
                                relevance_score: relevance,
                                attempt,
                            });
                        } else {
                            let bullet_reasons = result.reason_strings();
                            reasons.extend(bullet_reasons.iter().cloned());
                            violations.push(GroundingViolation {
                                stage: ViolationStage::RoleBullets,
                                role_id: Some(role.role_id),
                                attempt,
                                text: draft.text,
                                reasons: bullet_reasons,
                            });
                        }
                    }
                }
                Err(malformed) => reasons.push(malformed),
            }

            let clean = reasons.is_empty() && accepted_this_attempt > 0;
            state = state.advance(clean);
            transitions.push(state);

            if clean {
                debug!(
                    role_id = %role.role_id,
                    attempt,
                    accepted = accepted_this_attempt,
                    "Role bullets accepted"
                );
            } else {
                warn!(
                    role_id = %role.role_id,
                    attempt,
                    accepted = accepted_this_attempt,
                    rejections = reasons.len(),
                    reasons = ?reasons,
                    next = ?state,
                    "Role bullets rejected"
                );
                feedback = reasons;
            }
        }

        let bullets = finalize_bullets(accepted, request.bullets_wanted);
        info!(
            role_id = %role.role_id,
            state = ?state,
            bullets = bullets.len(),
            violations = violations.len(),
            provider_calls,
            "Role generation finished"
        );

        Ok(RoleOutput {
            role_id: role.role_id,
            state,
            bullets,
            violations,
            transitions,
            provider_calls,
        })
    }
}

/// Drops repeated texts across attempts, orders by relevance, keeps `wanted`.
fn finalize_bullets(accepted: Vec<GeneratedBullet>, wanted: usize) -> Vec<GeneratedBullet> {
    let mut seen = HashSet::new();
    let mut bullets: Vec<GeneratedBullet> = accepted
        .into_iter()
        .filter(|b| seen.insert(b.text.to_lowercase()))
        .collect();
    // Stable: equal scores keep generation order.
    bullets.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    bullets.truncate(wanted);
    bullets
}

fn build_role_prompt(
    role: &RoleBlock,
    profile: &RequirementProfile,
    request: &RoleRequest,
    feedback: &[String],
) -> String {
    let lens = lens_for(profile.role_category);

    let mut competencies: Vec<(&String, &f64)> = profile.competency_weights.iter().collect();
    competencies.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
    let competency_lines: Vec<String> = competencies
        .iter()
        .map(|(name, weight)| format!("{name} ({weight:.2})"))
        .collect();

    let priority_section = if request.priority_keywords.is_empty() {
        String::new()
    } else {
        PRIORITY_KEYWORDS_TEMPLATE.replace(
            "{keywords}",
            &bullet_list(request.priority_keywords.iter().map(String::as_str)),
        )
    };
    let priority_section = if request.emphasize_seniority {
        format!("{priority_section}{SENIORITY_EMPHASIS}")
    } else {
        priority_section
    };

    let feedback_section = if feedback.is_empty() {
        String::new()
    } else {
        REGENERATION_FEEDBACK_TEMPLATE
            .replace("{reasons}", &bullet_list(feedback.iter().map(String::as_str)))
    };

    ROLE_BULLETS_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{skill_instruction}", SKILL_CITATION_INSTRUCTION)
        .replace("{employer}", &role.employer)
        .replace("{title}", &role.title)
        .replace(
            "{achievements}",
            &bullet_list(role.achievements.iter().map(String::as_str)),
        )
        .replace(
            "{skill_tags}",
            &bullet_list(role.skill_tags.iter().map(String::as_str)),
        )
        .replace(
            "{competencies}",
            &bullet_list(competency_lines.iter().map(String::as_str)),
        )
        .replace(
            "{required_keywords}",
            &bullet_list(profile.required_keywords.iter().map(String::as_str)),
        )
        .replace(
            "{responsibilities}",
            &bullet_list(profile.inferred_responsibilities.iter().map(String::as_str)),
        )
        .replace("{seniority_verbs}", &lens.expected_verbs.join(", "))
        .replace("{avoid_verbs}", &lens.avoid_verbs.join(", "))
        .replace("{priority_section}", &priority_section)
        .replace("{feedback_section}", &feedback_section)
        .replace("{bullets_wanted}", &request.bullets_wanted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::StrictGroundingValidator;
    use crate::testing::{fixture_profile, fixture_role, ScriptedProvider};
    use serde_json::json;

    fn generator(provider: Arc<ScriptedProvider>) -> RoleGenerator {
        RoleGenerator::new(
            provider,
            Arc::new(StrictGroundingValidator),
            RelevanceWeights::default(),
        )
    }

    fn watched() -> BTreeSet<String> {
        ["AWS", "Python", "Kubernetes", "Java"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_state_machine_is_bounded_to_two_attempts() {
        let s = RoleGenState::Pending.advance(false);
        assert_eq!(s, RoleGenState::RejectedOnce);
        assert_eq!(s.attempt(), Some(2));
        let s = s.advance(false);
        assert_eq!(s, RoleGenState::Degraded);
        assert_eq!(s.attempt(), None);
        assert_eq!(s.advance(true), RoleGenState::Degraded);
    }

    #[test]
    fn test_request_clamps_bullet_count() {
        assert_eq!(RoleRequest::new(1).bullets_wanted, 3);
        assert_eq!(RoleRequest::new(9).bullets_wanted, 6);
    }

    #[tokio::test]
    async fn test_clean_first_attempt_is_accepted_with_one_call() {
        let role = fixture_role("Acme", &["Python", "AWS"], &["Delivered a 40% latency reduction on AWS"]);
        let provider = Arc::new(ScriptedProvider::new().with_role_response(
            role.role_id,
            json!([
                {"text": "Delivered a 40% latency reduction on AWS services", "cited_skills": ["aws"]},
                {"text": "Built Python tooling for the platform team", "cited_skills": ["Python"]}
            ]),
        ));
        let out = generator(provider.clone())
            .generate_role(&role, &fixture_profile(), &watched(), &RoleRequest::new(4))
            .await
            .unwrap();

        assert_eq!(out.state, RoleGenState::Accepted);
        assert_eq!(out.provider_calls, 1);
        assert_eq!(out.bullets.len(), 2);
        assert!(out.bullets.iter().any(|b| b.cited_skills == vec!["AWS".to_string()]));
        assert!(out.violations.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_triggers_single_regeneration_with_reasons() {
        let role = fixture_role("Acme", &["Java"], &["Maintained the Java billing monolith"]);
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_role_response(
                    role.role_id,
                    json!([{"text": "Migrated the Java monolith to Kubernetes", "cited_skills": ["Java", "Kubernetes"]}]),
                )
                .with_role_response(
                    role.role_id,
                    json!([{"text": "Maintained the Java billing monolith for finance", "cited_skills": ["Java"]}]),
                ),
        );
        let out = generator(provider.clone())
            .generate_role(&role, &fixture_profile(), &watched(), &RoleRequest::new(3))
            .await
            .unwrap();

        assert_eq!(out.state, RoleGenState::Accepted);
        assert_eq!(out.provider_calls, 2);
        assert_eq!(out.transitions, vec![RoleGenState::Pending, RoleGenState::RejectedOnce, RoleGenState::Accepted]);
        assert_eq!(out.bullets.len(), 1);
        assert_eq!(out.bullets[0].attempt, 2);
        assert_eq!(out.violations.len(), 1);

        let prompts = provider.prompts_for(GenerationTask::RoleBullets);
        assert!(prompts[1].contains("PREVIOUS ATTEMPT WAS REJECTED"));
        assert!(prompts[1].contains("Kubernetes"));
    }

    #[tokio::test]
    async fn test_two_bad_attempts_degrade_and_keep_partial_accepts() {
        let role = fixture_role("Acme", &["Java"], &["Maintained the Java billing monolith"]);
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_role_response(
                    role.role_id,
                    json!([
                        {"text": "Maintained the Java billing monolith", "cited_skills": ["Java"]},
                        {"text": "Cut costs by 30%", "cited_skills": []}
                    ]),
                )
                .with_role_response(role.role_id, json!("not a list")),
        );
        let out = generator(provider)
            .generate_role(&role, &fixture_profile(), &watched(), &RoleRequest::new(3))
            .await
            .unwrap();

        assert_eq!(out.state, RoleGenState::Degraded);
        assert_eq!(out.provider_calls, 2);
        assert_eq!(out.bullets.len(), 1);
        assert_eq!(out.bullets[0].attempt, 1);
    }

    #[tokio::test]
    async fn test_role_without_achievements_skips_provider() {
        let role = fixture_role("Acme", &["Java"], &[]);
        let provider = Arc::new(ScriptedProvider::new());
        let out = generator(provider.clone())
            .generate_role(&role, &fixture_profile(), &watched(), &RoleRequest::new(3))
            .await
            .unwrap();
        assert_eq!(out.state, RoleGenState::Degraded);
        assert_eq!(provider.calls(GenerationTask::RoleBullets), 0);
    }

    #[tokio::test]
    async fn test_object_envelope_is_tolerated() {
        let role = fixture_role("Acme", &["Java"], &["Maintained the Java billing monolith"]);
        let provider = Arc::new(ScriptedProvider::new().with_role_response(
            role.role_id,
            json!({"bullets": [{"text": "Maintained the Java billing monolith", "cited_skills": ["Java"]}]}),
        ));
        let out = generator(provider)
            .generate_role(&role, &fixture_profile(), &watched(), &RoleRequest::new(3))
            .await
            .unwrap();
        assert_eq!(out.state, RoleGenState::Accepted);
    }

    #[tokio::test]
    async fn test_generate_all_preserves_input_order() {
        let a = fixture_role("A", &["Java"], &["Maintained the Java billing monolith"]);
        let b = fixture_role("B", &["Python"], &["Wrote Python ETL jobs"]);
        let provider = Arc::new(
            ScriptedProvider::new()
                .with_role_response(a.role_id, json!([{"text": "Maintained the Java billing monolith", "cited_skills": ["Java"]}]))
                .with_role_response(b.role_id, json!([{"text": "Wrote Python ETL jobs for reporting", "cited_skills": ["Python"]}])),
        );
        let ids = vec![a.role_id, b.role_id];
        let outputs = generator(provider)
            .generate_all(
                vec![(a, RoleRequest::new(3)), (b, RoleRequest::new(3))],
                Arc::new(fixture_profile()),
                Arc::new(watched()),
            )
            .await
            .unwrap();
        let got: Vec<Uuid> = outputs.iter().map(|o| o.role_id).collect();
        assert_eq!(got, ids);
    }
}

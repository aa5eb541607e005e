//! Grader: scores an assembled document on five independent dimensions.
//!
//! A report passes only when the composite clears `pass_threshold` AND no dimension sits
//! below its floor. Deficiencies are ordered floor violations first, then by weighted
//! gap to target, and each carries the typed remedies the improver dispatches on.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::generation::role_generator::MAX_BULLETS_PER_ROLE;
use crate::generation::seniority::{lens_for, title_alignment, verb_alignment};
use crate::generation::summary::AggregateFacts;
use crate::grading::assessment::SeniorityAssessor;
use crate::grading::policy::GradingPolicy;
use crate::grounding::claims::contains_term;
use crate::grounding::{Candidate, GroundingValidator, SourceFacts};
use crate::models::document::{StitchedDocument, WordBudget};
use crate::models::grade::{Deficiency, Dimension, GradeReport, GroundingViolation, Remedy};
use crate::models::profile::RequirementProfile;
use crate::models::role_block::RoleBlock;

/// Everything a grading pass looks at.
pub struct GradeInput<'a> {
    pub document: &'a StitchedDocument,
    /// Recency-ordered.
    pub roles: &'a [RoleBlock],
    pub profile: &'a RequirementProfile,
    pub facts: &'a AggregateFacts,
    pub skill_union: &'a BTreeSet<String>,
    pub watched_terms: &'a BTreeSet<String>,
    pub budget: WordBudget,
    /// Every rejection seen so far in the run.
    pub grounding_violations: &'a [GroundingViolation],
    pub iteration: u32,
}

/// Whole-word keyword match with the same casing rules grounding applies, so a keyword
/// counted here is one the validator will accept.
pub fn mentions_keyword(text: &str, keyword: &str) -> bool {
    contains_term(text, keyword)
}

/// Whether a role's skill tags or achievements carry `keyword`.
pub fn role_supports(role: &RoleBlock, keyword: &str) -> bool {
    role.skill_tags.iter().any(|t| t.eq_ignore_ascii_case(keyword))
        || role.achievements.iter().any(|a| mentions_keyword(a, keyword))
}

// ────────────────────────────────────────────────────────────────────────────
// Dimension scorers
// ────────────────────────────────────────────────────────────────────────────

struct Scored {
    score: f64,
    reason: String,
    remedies: Vec<Remedy>,
}

fn score_grounding(input: &GradeInput<'_>, validator: &dyn GroundingValidator) -> Scored {
    let doc = input.document;
    let mut total = 0usize;
    let mut bad_bullets = Vec::new();

    for bullet in doc.bullets() {
        total += 1;
        let grounded = input
            .roles
            .iter()
            .find(|r| r.role_id == bullet.role_id)
            .map(|role| {
                let source = role.source_text();
                validator
                    .validate(
                        &Candidate {
                            text: &bullet.text,
                            cited_skills: &bullet.cited_skills,
                        },
                        &SourceFacts {
                            skill_tags: &role.skill_tags,
                            source_text: &source,
                            watched_terms: input.watched_terms,
                        },
                    )
                    .accepted()
            })
            .unwrap_or(false);
        if !grounded {
            bad_bullets.push(bullet.bullet_id);
        }
    }

    let mut bad_skills = 0usize;
    for skill in doc.skill_categories.all_skills() {
        total += 1;
        if !input.skill_union.contains(skill) {
            bad_skills += 1;
        }
    }

    let mut summary_bad = false;
    if !doc.summary_text.trim().is_empty() {
        total += 1;
        let facts_text = input.facts.source_text();
        summary_bad = !validator
            .validate(
                &Candidate {
                    text: &doc.summary_text,
                    cited_skills: &[],
                },
                &SourceFacts {
                    skill_tags: input.skill_union,
                    source_text: &facts_text,
                    watched_terms: input.watched_terms,
                },
            )
            .accepted();
    }

    let bad = bad_bullets.len() + bad_skills + usize::from(summary_bad);
    let score = if total == 0 {
        100.0
    } else {
        100.0 * (total - bad) as f64 / total as f64
    };

    let mut remedies = Vec::new();
    if !bad_bullets.is_empty() {
        remedies.push(Remedy::DropBullets {
            bullet_ids: bad_bullets.clone(),
        });
    }
    if summary_bad {
        remedies.push(Remedy::RegenerateSummary);
    }
    if bad_skills > 0 {
        remedies.push(Remedy::RegenerateSkillCategories);
    }

    Scored {
        score,
        reason: format!(
            "{bad} of {total} items ungrounded ({} bullets, {bad_skills} skills, summary {})",
            bad_bullets.len(),
            if summary_bad { "ungrounded" } else { "ok" }
        ),
        remedies,
    }
}

fn score_keywords(input: &GradeInput<'_>) -> Scored {
    let required = &input.profile.required_keywords;
    if required.is_empty() {
        return Scored {
            score: 100.0,
            reason: "no required keywords".to_string(),
            remedies: Vec::new(),
        };
    }

    let text = input.document.full_text();
    let missing: Vec<&String> = required
        .iter()
        .filter(|k| !mentions_keyword(&text, k))
        .collect();
    let score = 100.0 * (required.len() - missing.len()) as f64 / required.len() as f64;

    let mut role_ids = Vec::new();
    let mut priority: BTreeSet<String> = BTreeSet::new();
    for role in input.roles.iter().filter(|r| r.has_achievements()) {
        let supported: Vec<&String> = missing
            .iter()
            .copied()
            .filter(|k| role_supports(role, k))
            .collect();
        if !supported.is_empty() {
            role_ids.push(role.role_id);
            priority.extend(supported.into_iter().cloned());
        }
    }

    let mut remedies = Vec::new();
    if !role_ids.is_empty() {
        remedies.push(Remedy::RegenerateRoles {
            role_ids,
            priority_keywords: priority.into_iter().collect(),
        });
    }
    if missing
        .iter()
        .any(|k| input.skill_union.iter().any(|s| s.eq_ignore_ascii_case(k)))
    {
        remedies.push(Remedy::RegenerateSkillCategories);
    }
    if remedies.is_empty() && !missing.is_empty() {
        remedies.push(Remedy::Unresolvable);
    }

    Scored {
        score,
        reason: if missing.is_empty() {
            "all required keywords present".to_string()
        } else {
            format!(
                "missing required keywords: {}",
                missing.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
            )
        },
        remedies,
    }
}

/// 50/50 blend of title-level distance and seniority verb usage. 0–100.
pub fn heuristic_seniority(document: &StitchedDocument, roles: &[RoleBlock], profile: &RequirementProfile) -> f64 {
    let held: Vec<_> = roles
        .iter()
        .filter(|r| !r.title.trim().is_empty())
        .map(RoleBlock::category)
        .collect();
    let lens = lens_for(profile.role_category);
    let verbs = verb_alignment(document.bullets().map(|b| b.text.as_str()), &lens);
    100.0 * (0.5 * title_alignment(&held, profile.role_category) + 0.5 * verbs)
}

fn seniority_remedies(input: &GradeInput<'_>) -> Vec<Remedy> {
    let role_ids: Vec<Uuid> = input
        .roles
        .iter()
        .filter(|r| r.has_achievements())
        .take(2)
        .map(|r| r.role_id)
        .collect();
    if role_ids.is_empty() {
        vec![Remedy::Unresolvable]
    } else {
        vec![Remedy::EmphasizeSeniority { role_ids }]
    }
}

/// 100 inside the budget; loses 2 points per percent of distance outside it.
pub fn length_score(words: usize, budget: WordBudget) -> f64 {
    if budget.contains(words) {
        return 100.0;
    }
    let distance = if words < budget.min {
        (budget.min - words) as f64 / budget.min.max(1) as f64
    } else {
        (words - budget.max) as f64 / budget.max.max(1) as f64
    };
    (100.0 * (1.0 - 2.0 * distance)).clamp(0.0, 100.0)
}

fn score_length(input: &GradeInput<'_>) -> Scored {
    let doc = input.document;
    let words = doc.total_word_count;
    let score = length_score(words, input.budget);

    let remedies = if words > input.budget.max {
        vec![Remedy::Restitch {
            bullet_budget: doc.bullet_budget * 9 / 10,
        }]
    } else if words < input.budget.min {
        let role_ids: Vec<Uuid> = input
            .roles
            .iter()
            .filter(|r| r.has_achievements())
            .filter(|r| {
                doc.section_for(r.role_id)
                    .map(|s| s.bullets.len() < MAX_BULLETS_PER_ROLE)
                    .unwrap_or(true)
            })
            .map(|r| r.role_id)
            .collect();
        if role_ids.is_empty() {
            vec![Remedy::Unresolvable]
        } else {
            vec![Remedy::ExpandRoles { role_ids }]
        }
    } else {
        Vec::new()
    };

    Scored {
        score,
        reason: format!(
            "{words} words against a budget of {}..={}",
            input.budget.min, input.budget.max
        ),
        remedies,
    }
}

fn score_structure(input: &GradeInput<'_>) -> Scored {
    let doc = input.document;
    let expected: Vec<&RoleBlock> = input.roles.iter().filter(|r| r.has_achievements()).collect();
    let unrepresented: Vec<Uuid> = expected
        .iter()
        .filter(|r| doc.section_for(r.role_id).map(|s| s.bullets.is_empty()).unwrap_or(true))
        .map(|r| r.role_id)
        .collect();
    let summary_present = !doc.summary_text.trim().is_empty();
    let skills_present = !doc.skill_categories.is_empty();

    let total = expected.len() + 2;
    let satisfied = expected.len() - unrepresented.len()
        + usize::from(summary_present)
        + usize::from(skills_present);
    let score = 100.0 * satisfied as f64 / total as f64;

    let mut remedies = Vec::new();
    if !unrepresented.is_empty() {
        remedies.push(Remedy::RegenerateRoles {
            role_ids: unrepresented.clone(),
            priority_keywords: Vec::new(),
        });
    }
    if !summary_present {
        remedies.push(Remedy::RegenerateSummary);
    }
    if !skills_present {
        remedies.push(if input.skill_union.is_empty() {
            Remedy::Unresolvable
        } else {
            Remedy::RegenerateSkillCategories
        });
    }

    let mut missing = Vec::new();
    if !unrepresented.is_empty() {
        missing.push(format!("{} roles unrepresented", unrepresented.len()));
    }
    if !summary_present {
        missing.push("summary missing".to_string());
    }
    if !skills_present {
        missing.push("skills missing".to_string());
    }
    Scored {
        score,
        reason: if missing.is_empty() {
            "complete".to_string()
        } else {
            missing.join("; ")
        },
        remedies,
    }
}

fn suggested_fix(dimension: Dimension, remedies: &[Remedy]) -> String {
    if remedies.iter().all(|r| matches!(r, Remedy::Unresolvable)) {
        return match dimension {
            Dimension::KeywordCoverage => {
                "The corpus does not support the missing keywords; add achievements that use them.".to_string()
            }
            Dimension::StructuralCompleteness => {
                "The corpus has no skill tags to group; tag skills on the candidate's roles.".to_string()
            }
            _ => "Not fixable from the current corpus; enrich the candidate's role records.".to_string(),
        };
    }
    match dimension {
        Dimension::FactualGrounding => {
            "Drop the ungrounded bullets and regenerate any ungrounded summary or skill list.".to_string()
        }
        Dimension::KeywordCoverage => {
            "Regenerate the roles whose source mentions the missing keywords, flagging them as priority.".to_string()
        }
        Dimension::SeniorityAlignment => {
            "Regenerate the most recent roles leading with verbs that match the target seniority.".to_string()
        }
        Dimension::LengthCompliance => {
            if remedies.iter().any(|r| matches!(r, Remedy::Restitch { .. })) {
                "Re-stitch against a tighter word budget.".to_string()
            } else {
                "Request one more bullet from roles with unused source material and re-stitch.".to_string()
            }
        }
        Dimension::StructuralCompleteness => {
            "Regenerate the missing sections so every role, the summary, and skills appear.".to_string()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Grader
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Grader {
    validator: Arc<dyn GroundingValidator>,
    assessor: SeniorityAssessor,
    policy: GradingPolicy,
}

impl Grader {
    pub fn new(
        validator: Arc<dyn GroundingValidator>,
        assessor: SeniorityAssessor,
        policy: GradingPolicy,
    ) -> Self {
        Self {
            validator,
            assessor,
            policy,
        }
    }

    /// Grades every dimension. Never fails: a missing model opinion only narrows the
    /// seniority signal to the heuristic.
    pub async fn grade(&self, input: &GradeInput<'_>) -> GradeReport {
        let heuristic = heuristic_seniority(input.document, input.roles, input.profile);
        let assessed = if self.policy.llm_seniority {
            self.assessor
                .assess(input.document, input.roles, input.profile)
                .await
        } else {
            None
        };
        let seniority = Scored {
            score: assessed.map(|a| (a + heuristic) / 2.0).unwrap_or(heuristic),
            reason: match assessed {
                Some(a) => format!("heuristic {heuristic:.0}, assessment {a:.0}"),
                None => format!("heuristic {heuristic:.0}"),
            },
            remedies: seniority_remedies(input),
        };

        let scored: Vec<(Dimension, Scored)> = vec![
            (
                Dimension::FactualGrounding,
                score_grounding(input, self.validator.as_ref()),
            ),
            (Dimension::KeywordCoverage, score_keywords(input)),
            (Dimension::SeniorityAlignment, seniority),
            (Dimension::LengthCompliance, score_length(input)),
            (Dimension::StructuralCompleteness, score_structure(input)),
        ];

        let dimension_scores: BTreeMap<Dimension, f64> =
            scored.iter().map(|(d, s)| (*d, s.score)).collect();
        let composite_score = self.policy.composite(&dimension_scores);

        let mut deficiencies: Vec<Deficiency> = scored
            .into_iter()
            .filter_map(|(dimension, s)| {
                let p = self.policy.get(dimension);
                (s.score < p.target).then(|| Deficiency {
                    dimension,
                    score: s.score,
                    target: p.target,
                    floor_violated: s.score < p.floor,
                    suggested_fix: suggested_fix(dimension, &s.remedies),
                    reason: s.reason,
                    remedies: s.remedies,
                })
            })
            .collect();
        deficiencies.sort_by(|a, b| {
            b.floor_violated.cmp(&a.floor_violated).then_with(|| {
                let gap = |d: &Deficiency| self.policy.get(d.dimension).weight * (d.target - d.score);
                gap(b)
                    .partial_cmp(&gap(a))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        let pass = composite_score >= self.policy.pass_threshold
            && !deficiencies.iter().any(|d| d.floor_violated);

        info!(
            iteration = input.iteration,
            composite = composite_score,
            pass,
            deficiencies = deficiencies.len(),
            grounding = dimension_scores.get(&Dimension::FactualGrounding).copied().unwrap_or(0.0),
            keywords = dimension_scores.get(&Dimension::KeywordCoverage).copied().unwrap_or(0.0),
            seniority = dimension_scores.get(&Dimension::SeniorityAlignment).copied().unwrap_or(0.0),
            length = dimension_scores.get(&Dimension::LengthCompliance).copied().unwrap_or(0.0),
            structure = dimension_scores.get(&Dimension::StructuralCompleteness).copied().unwrap_or(0.0),
            "Graded document"
        );

        GradeReport {
            report_id: Uuid::new_v4(),
            iteration: input.iteration,
            dimension_scores,
            composite_score,
            deficiencies,
            grounding_violations: input.grounding_violations.to_vec(),
            pass,
            graded_at: Utc::now(),
        }
    }
}

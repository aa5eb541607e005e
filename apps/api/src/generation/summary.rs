//! Profile summary generation.
//!
//! The summary is written from `AggregateFacts` only. It gets one regeneration after a
//! rejection, then falls back to a deterministic template built from the same facts.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::generation::prompts::{REGENERATION_FEEDBACK_TEMPLATE, SUMMARY_PROMPT_TEMPLATE};
use crate::generation::GenerationError;
use crate::grounding::claims::contains_term;
use crate::grounding::{Candidate, GroundingValidator, SourceFacts};
use crate::llm_client::prompts::{bullet_list, GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::{GenerationConstraints, GenerationOutput, GenerationProvider, GenerationTask, PromptContext};
use crate::models::document::word_count;
use crate::models::grade::{GroundingViolation, ViolationStage};
use crate::models::profile::{RequirementProfile, RoleCategory};
use crate::models::role_block::RoleBlock;

const SUMMARY_ATTEMPTS: u8 = 2;
const TEMPLATE_SKILLS: usize = 3;

/// Career-level facts derived from the whole corpus. The only facts a summary may state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateFacts {
    /// Whole years from the earliest start to the latest end (or `as_of` for current roles).
    pub years_experience: Option<u32>,
    pub role_categories: BTreeSet<RoleCategory>,
    pub employer_count: usize,
    pub most_recent_title: Option<String>,
}

impl AggregateFacts {
    /// `roles` must be recency-ordered.
    pub fn from_roles(roles: &[RoleBlock], as_of: NaiveDate) -> Self {
        let earliest = roles.iter().filter_map(|r| r.period.start).min();
        let latest = roles
            .iter()
            .filter_map(|r| {
                if r.is_current {
                    Some(as_of)
                } else {
                    r.period.end
                }
            })
            .max();
        let years_experience = match (earliest, latest) {
            (Some(start), Some(end)) if end >= start => {
                let months = (end.year() - start.year()) * 12 + end.month() as i32
                    - start.month() as i32;
                Some((months / 12) as u32)
            }
            _ => None,
        };

        let employers: BTreeSet<String> = roles
            .iter()
            .map(|r| r.employer.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Self {
            years_experience,
            role_categories: roles
                .iter()
                .filter(|r| !r.title.trim().is_empty())
                .map(RoleBlock::category)
                .collect(),
            employer_count: employers.len(),
            most_recent_title: roles
                .iter()
                .map(|r| r.title.trim())
                .find(|t| !t.is_empty())
                .map(str::to_string),
        }
    }

    /// One fact per line; doubles as the grounding source for the summary.
    pub fn source_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(years) = self.years_experience {
            lines.push(format!("{years} years of experience"));
        }
        lines.push(format!(
            "{} {}",
            self.employer_count,
            if self.employer_count == 1 { "employer" } else { "employers" }
        ));
        if let Some(title) = &self.most_recent_title {
            lines.push(format!("Most recent title: {title}"));
        }
        if !self.role_categories.is_empty() {
            let held: Vec<&str> = self.role_categories.iter().map(|c| c.label()).collect();
            lines.push(format!("Role levels held: {}", held.join(", ")));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Generated,
    Template,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    pub text: String,
    pub source: SummarySource,
    pub violations: Vec<GroundingViolation>,
    pub provider_calls: u32,
}

/// Everything summary validation checks against.
pub struct SummaryGround<'a> {
    pub facts: &'a AggregateFacts,
    pub skill_union: &'a BTreeSet<String>,
    pub watched_terms: &'a BTreeSet<String>,
    pub max_words: usize,
}

/// Rejection reasons for a summary; empty when it is acceptable.
pub fn validate_summary(
    text: &str,
    ground: &SummaryGround<'_>,
    validator: &dyn GroundingValidator,
) -> Vec<String> {
    let facts_text = ground.facts.source_text();
    let result = validator.validate(
        &Candidate {
            text,
            cited_skills: &[],
        },
        &SourceFacts {
            skill_tags: ground.skill_union,
            source_text: &facts_text,
            watched_terms: ground.watched_terms,
        },
    );
    let mut reasons = result.reason_strings();
    let words = word_count(text);
    if words > ground.max_words {
        reasons.push(format!(
            "summary has {words} words, limit is {}",
            ground.max_words
        ));
    }
    reasons
}

/// Deterministic fallback built only from aggregate facts and corpus skills.
pub fn template_summary(ground: &SummaryGround<'_>, profile: &RequirementProfile) -> String {
    let facts = ground.facts;
    let lead = facts
        .most_recent_title
        .clone()
        .unwrap_or_else(|| "Professional".to_string());

    let mut sentence = lead;
    if let Some(years) = facts.years_experience.filter(|y| *y > 0) {
        sentence.push_str(&format!(
            " with {years} {} of experience",
            if years == 1 { "year" } else { "years" }
        ));
    }
    if facts.employer_count > 0 {
        sentence.push_str(&format!(
            " across {} {}",
            facts.employer_count,
            if facts.employer_count == 1 { "employer" } else { "employers" }
        ));
    }
    sentence.push('.');

    // Skills the profile asks for first, then the rest alphabetically.
    let terms = profile.watched_terms();
    let (mut wanted, rest): (Vec<&String>, Vec<&String>) = ground
        .skill_union
        .iter()
        .partition(|s| terms.iter().any(|t| t.eq_ignore_ascii_case(s)));
    wanted.extend(rest);
    let skills: Vec<&str> = wanted
        .into_iter()
        .take(TEMPLATE_SKILLS)
        .map(String::as_str)
        .collect();

    let with_skills = match skills.as_slice() {
        [] => sentence.clone(),
        [one] => format!("{sentence} Skilled in {one}."),
        [init @ .., last] => format!("{sentence} Skilled in {} and {last}.", init.join(", ")),
    };

    if word_count(&with_skills) <= ground.max_words {
        with_skills
    } else if word_count(&sentence) <= ground.max_words {
        sentence
    } else {
        sentence
            .split_whitespace()
            .take(ground.max_words)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn extract_summary(output: &GenerationOutput) -> Result<String, String> {
    let text = match &output.structured {
        Some(value) => value
            .get("summary")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| "output had no `summary` string".to_string())?,
        None => output.text.trim().to_string(),
    };
    if text.trim().is_empty() {
        return Err("summary was empty".to_string());
    }
    Ok(text.trim().to_string())
}

#[derive(Clone)]
pub struct SummaryGenerator {
    provider: Arc<dyn GenerationProvider>,
    validator: Arc<dyn GroundingValidator>,
}

impl SummaryGenerator {
    pub fn new(provider: Arc<dyn GenerationProvider>, validator: Arc<dyn GroundingValidator>) -> Self {
        Self { provider, validator }
    }

    pub async fn generate(
        &self,
        ground: &SummaryGround<'_>,
        profile: &RequirementProfile,
    ) -> Result<SummaryOutcome, GenerationError> {
        let mut violations = Vec::new();
        let mut feedback: Vec<String> = Vec::new();
        let mut provider_calls = 0u32;

        for attempt in 1..=SUMMARY_ATTEMPTS {
            let context = PromptContext {
                system: JSON_ONLY_SYSTEM.to_string(),
                prompt: build_summary_prompt(ground, profile, &feedback),
            };
            let constraints = GenerationConstraints {
                max_tokens: 512,
                ..GenerationConstraints::narrative_json(GenerationTask::Summary)
            };
            provider_calls += 1;
            let output = self.provider.generate(&context, &constraints).await?;

            let reasons = match extract_summary(&output) {
                Ok(text) => {
                    let reasons = validate_summary(&text, ground, self.validator.as_ref());
                    if reasons.is_empty() {
                        info!(attempt, words = word_count(&text), "Summary accepted");
                        return Ok(SummaryOutcome {
                            text,
                            source: SummarySource::Generated,
                            violations,
                            provider_calls,
                        });
                    }
                    violations.push(GroundingViolation {
                        stage: ViolationStage::Summary,
                        role_id: None,
                        attempt,
                        text,
                        reasons: reasons.clone(),
                    });
                    reasons
                }
                Err(malformed) => vec![malformed],
            };

            warn!(attempt, reasons = ?reasons, "Summary rejected");
            feedback = reasons;
        }

        let text = template_summary(ground, profile);
        info!(words = word_count(&text), "Summary fell back to template");
        Ok(SummaryOutcome {
            text,
            source: SummarySource::Template,
            violations,
            provider_calls,
        })
    }
}

fn build_summary_prompt(
    ground: &SummaryGround<'_>,
    profile: &RequirementProfile,
    feedback: &[String],
) -> String {
    let feedback_section = if feedback.is_empty() {
        String::new()
    } else {
        REGENERATION_FEEDBACK_TEMPLATE
            .replace("{reasons}", &bullet_list(feedback.iter().map(String::as_str)))
    };
    // Only skills the profile cares about are worth a summary mention.
    let terms = profile.watched_terms();
    let relevant: Vec<&str> = ground
        .skill_union
        .iter()
        .filter(|s| terms.iter().any(|t| contains_term(s, t) || t.eq_ignore_ascii_case(s)))
        .map(String::as_str)
        .collect();
    let skills = if relevant.is_empty() {
        bullet_list(ground.skill_union.iter().map(String::as_str))
    } else {
        bullet_list(relevant)
    };

    SUMMARY_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{role_category}", profile.role_category.label())
        .replace("{facts}", &ground.facts.source_text())
        .replace("{skills}", &skills)
        .replace("{max_words}", &ground.max_words.to_string())
        .replace("{feedback_section}", &feedback_section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::StrictGroundingValidator;
    use crate::testing::{dated_role, fixture_profile, ScriptedProvider};
    use serde_json::json;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn roles() -> Vec<RoleBlock> {
        vec![
            dated_role("Acme", "Senior Engineer", (2020, 6), None, &["AWS", "Python"]),
            dated_role("Globex", "Engineer", (2016, 6), Some((2020, 5)), &["Java"]),
        ]
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_aggregate_facts_from_roles() {
        let facts = AggregateFacts::from_roles(&roles(), as_of());
        assert_eq!(facts.years_experience, Some(8));
        assert_eq!(facts.employer_count, 2);
        assert_eq!(facts.most_recent_title.as_deref(), Some("Senior Engineer"));
        assert!(facts.role_categories.contains(&RoleCategory::Senior));
    }

    #[test]
    fn test_invented_number_and_skill_are_rejected() {
        let facts = AggregateFacts::from_roles(&roles(), as_of());
        let union = set(&["AWS", "Java", "Python"]);
        let watched = set(&["AWS", "Java", "Python", "Kubernetes"]);
        let ground = SummaryGround {
            facts: &facts,
            skill_union: &union,
            watched_terms: &watched,
            max_words: 60,
        };
        let reasons = validate_summary(
            "Engineer with 12 years running Kubernetes at scale",
            &ground,
            &StrictGroundingValidator,
        );
        assert_eq!(reasons.len(), 2, "{reasons:?}");
    }

    #[test]
    fn test_template_is_grounded_and_bounded() {
        let facts = AggregateFacts::from_roles(&roles(), as_of());
        let union = set(&["AWS", "Java", "Python"]);
        let watched = set(&["AWS", "Java", "Python", "Kubernetes"]);
        let ground = SummaryGround {
            facts: &facts,
            skill_union: &union,
            watched_terms: &watched,
            max_words: 60,
        };
        let text = template_summary(&ground, &fixture_profile());
        assert!(text.starts_with("Senior Engineer with 8 years of experience across 2 employers."));
        assert!(validate_summary(&text, &ground, &StrictGroundingValidator).is_empty());
    }

    #[tokio::test]
    async fn test_two_rejections_fall_back_to_template() {
        let facts = AggregateFacts::from_roles(&roles(), as_of());
        let union = set(&["AWS", "Java", "Python"]);
        let watched = set(&["AWS", "Java", "Python", "Kubernetes"]);
        let ground = SummaryGround {
            facts: &facts,
            skill_union: &union,
            watched_terms: &watched,
            max_words: 60,
        };
        let provider = Arc::new(ScriptedProvider::new().with_response(
            GenerationTask::Summary,
            json!({"summary": "Kubernetes expert with 20 years"}),
        ));
        let outcome = SummaryGenerator::new(provider, Arc::new(StrictGroundingValidator))
            .generate(&ground, &fixture_profile())
            .await
            .unwrap();
        assert_eq!(outcome.source, SummarySource::Template);
        assert_eq!(outcome.provider_calls, 2);
        assert_eq!(outcome.violations.len(), 2);
    }

    #[tokio::test]
    async fn test_technology_outside_corpus_forces_template() {
        let facts = AggregateFacts::from_roles(&roles(), as_of());
        let union = set(&["AWS", "Java", "Python"]);
        let watched = crate::grounding::lexicon::watched_terms(&union, &fixture_profile());
        let ground = SummaryGround {
            facts: &facts,
            skill_union: &union,
            watched_terms: &watched,
            max_words: 60,
        };
        let invented = "Senior Engineer with 8 years building Rust and GCP platforms";
        let reasons = validate_summary(invented, &ground, &StrictGroundingValidator);
        assert_eq!(reasons.len(), 2, "{reasons:?}");
        assert!(reasons.iter().any(|r| r.contains("'Rust'")));
        assert!(reasons.iter().any(|r| r.contains("'GCP'")));

        let provider = Arc::new(
            ScriptedProvider::new().with_response(GenerationTask::Summary, json!({ "summary": invented })),
        );
        let outcome = SummaryGenerator::new(provider, Arc::new(StrictGroundingValidator))
            .generate(&ground, &fixture_profile())
            .await
            .unwrap();
        assert_eq!(outcome.source, SummarySource::Template);
        assert!(!contains_term(&outcome.text, "Rust"));
        assert!(!contains_term(&outcome.text, "GCP"));
        assert!(validate_summary(&outcome.text, &ground, &StrictGroundingValidator).is_empty());
    }

    #[tokio::test]
    async fn test_grounded_summary_is_accepted() {
        let facts = AggregateFacts::from_roles(&roles(), as_of());
        let union = set(&["AWS", "Java", "Python"]);
        let watched = set(&["AWS", "Java", "Python"]);
        let ground = SummaryGround {
            facts: &facts,
            skill_union: &union,
            watched_terms: &watched,
            max_words: 60,
        };
        let provider = Arc::new(ScriptedProvider::new().with_response(
            GenerationTask::Summary,
            json!({"summary": "Senior Engineer with 8 years across 2 employers building AWS and Python services"}),
        ));
        let outcome = SummaryGenerator::new(provider, Arc::new(StrictGroundingValidator))
            .generate(&ground, &fixture_profile())
            .await
            .unwrap();
        assert_eq!(outcome.source, SummarySource::Generated);
        assert_eq!(outcome.provider_calls, 1);
    }
}

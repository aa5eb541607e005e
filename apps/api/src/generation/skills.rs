//! Skill categorization.
//!
//! `validate_categories` is the single seam where generated groupings meet the corpus:
//! anything it lets through lists only skills from the corpus union. Two failed
//! attempts (or a union too small to group) fall back to the fixed lexicon buckets.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::generation::prompts::{REGENERATION_FEEDBACK_TEMPLATE, SKILL_CATEGORIES_PROMPT_TEMPLATE};
use crate::generation::GenerationError;
use crate::grounding::lexicon::{self, CLOUD_INFRA, DATA_STORAGE, LANGUAGES};
use crate::llm_client::prompts::{bullet_list, JSON_ONLY_SYSTEM};
use crate::llm_client::{GenerationConstraints, GenerationProvider, GenerationTask, PromptContext};
use crate::models::document::{SkillCategories, SkillCategory};
use crate::models::grade::{GroundingViolation, ViolationStage};
use crate::models::profile::RequirementProfile;

pub const MIN_CATEGORIES: usize = 3;
pub const MAX_CATEGORIES: usize = 4;
const CATEGORY_ATTEMPTS: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CategoryRejection {
    Malformed(String),
    WrongCount(usize),
    EmptyName,
    DuplicateName(String),
    EmptySkills(String),
    UnsourcedSkill(String),
    DuplicateSkill(String),
}

impl fmt::Display for CategoryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryRejection::Malformed(e) => write!(f, "malformed categories: {e}"),
            CategoryRejection::WrongCount(n) => write!(
                f,
                "expected {MIN_CATEGORIES} to {MAX_CATEGORIES} categories, got {n}"
            ),
            CategoryRejection::EmptyName => write!(f, "a category has an empty name"),
            CategoryRejection::DuplicateName(n) => write!(f, "category '{n}' appears twice"),
            CategoryRejection::EmptySkills(n) => write!(f, "category '{n}' has no skills"),
            CategoryRejection::UnsourcedSkill(s) => {
                write!(f, "skill '{s}' is not in the candidate's skill tags")
            }
            CategoryRejection::DuplicateSkill(s) => write!(f, "skill '{s}' is listed twice"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: String,
    skills: Vec<String>,
}

/// Checks a raw generated grouping against the corpus skill union and returns it with
/// every skill in the corpus's spelling.
pub fn validate_categories(
    raw: &Value,
    skill_union: &BTreeSet<String>,
) -> Result<Vec<SkillCategory>, Vec<CategoryRejection>> {
    let array = if raw.is_array() {
        raw.clone()
    } else {
        raw.get("categories").cloned().unwrap_or(Value::Null)
    };
    let parsed: Vec<RawCategory> = serde_json::from_value(array)
        .map_err(|e| vec![CategoryRejection::Malformed(e.to_string())])?;

    let mut rejections = Vec::new();
    if !(MIN_CATEGORIES..=MAX_CATEGORIES).contains(&parsed.len()) {
        rejections.push(CategoryRejection::WrongCount(parsed.len()));
    }

    let mut names = HashSet::new();
    let mut seen_skills = HashSet::new();
    let mut categories = Vec::with_capacity(parsed.len());
    for raw in parsed {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            rejections.push(CategoryRejection::EmptyName);
        } else if !names.insert(name.to_lowercase()) {
            rejections.push(CategoryRejection::DuplicateName(name.clone()));
        }
        if raw.skills.is_empty() {
            rejections.push(CategoryRejection::EmptySkills(name.clone()));
        }

        let mut skills = Vec::with_capacity(raw.skills.len());
        for skill in raw.skills {
            match skill_union
                .iter()
                .find(|s| s.eq_ignore_ascii_case(skill.trim()))
            {
                Some(canonical) => {
                    if seen_skills.insert(canonical.clone()) {
                        skills.push(canonical.clone());
                    } else {
                        rejections.push(CategoryRejection::DuplicateSkill(canonical.clone()));
                    }
                }
                None => rejections.push(CategoryRejection::UnsourcedSkill(skill)),
            }
        }
        categories.push(SkillCategory { name, skills });
    }

    if rejections.is_empty() {
        Ok(categories)
    } else {
        Err(rejections)
    }
}

/// Fixed lexicon buckets over the corpus union. Empty buckets are omitted.
pub fn default_categories(skill_union: &BTreeSet<String>) -> SkillCategories {
    let bucket_of = |skill: &str| {
        if lexicon::lists(LANGUAGES, skill) {
            0
        } else if lexicon::lists(CLOUD_INFRA, skill) {
            1
        } else if lexicon::lists(DATA_STORAGE, skill) {
            2
        } else {
            3
        }
    };
    let names = ["Languages", "Cloud & Infrastructure", "Data & Storage", "Tools & Practices"];
    let mut buckets: [Vec<String>; 4] = Default::default();
    for skill in skill_union {
        buckets[bucket_of(skill)].push(skill.clone());
    }
    SkillCategories::Default(
        names
            .iter()
            .zip(buckets)
            .filter(|(_, skills)| !skills.is_empty())
            .map(|(name, skills)| SkillCategory {
                name: name.to_string(),
                skills,
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillsOutcome {
    pub categories: SkillCategories,
    pub violations: Vec<GroundingViolation>,
    pub provider_calls: u32,
}

#[derive(Clone)]
pub struct SkillCategorizer {
    provider: Arc<dyn GenerationProvider>,
}

impl SkillCategorizer {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    pub async fn categorize(
        &self,
        skill_union: &BTreeSet<String>,
        profile: &RequirementProfile,
    ) -> Result<SkillsOutcome, GenerationError> {
        let mut violations = Vec::new();
        let mut provider_calls = 0u32;

        if skill_union.len() < MIN_CATEGORIES {
            info!(
                skills = skill_union.len(),
                "Too few corpus skills to group, using default categories"
            );
            return Ok(SkillsOutcome {
                categories: default_categories(skill_union),
                violations,
                provider_calls,
            });
        }

        let mut feedback: Vec<String> = Vec::new();
        for attempt in 1..=CATEGORY_ATTEMPTS {
            let context = PromptContext {
                system: JSON_ONLY_SYSTEM.to_string(),
                prompt: build_categories_prompt(skill_union, profile, &feedback),
            };
            let constraints = GenerationConstraints {
                max_tokens: 1024,
                ..GenerationConstraints::narrative_json(GenerationTask::SkillCategories)
            };
            provider_calls += 1;
            let output = self.provider.generate(&context, &constraints).await?;

            let rejections = match &output.structured {
                Some(value) => match validate_categories(value, skill_union) {
                    Ok(categories) => {
                        info!(attempt, categories = categories.len(), "Skill categories accepted");
                        return Ok(SkillsOutcome {
                            categories: SkillCategories::Generated(categories),
                            violations,
                            provider_calls,
                        });
                    }
                    Err(rejections) => rejections,
                },
                None => vec![CategoryRejection::Malformed("output was not valid JSON".to_string())],
            };

            let reasons: Vec<String> = rejections.iter().map(ToString::to_string).collect();
            if rejections
                .iter()
                .any(|r| matches!(r, CategoryRejection::UnsourcedSkill(_)))
            {
                violations.push(GroundingViolation {
                    stage: ViolationStage::SkillCategories,
                    role_id: None,
                    attempt,
                    text: output.text.clone(),
                    reasons: reasons.clone(),
                });
            }
            warn!(attempt, reasons = ?reasons, "Skill categories rejected");
            feedback = reasons;
        }

        info!("Skill categories fell back to default lexicon");
        Ok(SkillsOutcome {
            categories: default_categories(skill_union),
            violations,
            provider_calls,
        })
    }
}

fn build_categories_prompt(
    skill_union: &BTreeSet<String>,
    profile: &RequirementProfile,
    feedback: &[String],
) -> String {
    let competencies: Vec<String> = profile
        .competency_weights
        .iter()
        .map(|(name, weight)| format!("{name} ({weight:.2})"))
        .collect();
    let feedback_section = if feedback.is_empty() {
        String::new()
    } else {
        REGENERATION_FEEDBACK_TEMPLATE
            .replace("{reasons}", &bullet_list(feedback.iter().map(String::as_str)))
    };
    SKILL_CATEGORIES_PROMPT_TEMPLATE
        .replace("{skills}", &bullet_list(skill_union.iter().map(String::as_str)))
        .replace("{competencies}", &bullet_list(competencies.iter().map(String::as_str)))
        .replace("{feedback_section}", &feedback_section)
}

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Competency weights must sum to 1.0 within this tolerance.
pub const WEIGHT_SUM_EPSILON: f64 = 0.01;

/// Seniority band of a role, ordered from most junior to most senior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCategory {
    Entry,
    Mid,
    Senior,
    Staff,
    Principal,
    Manager,
    Director,
    Executive,
}

impl RoleCategory {
    /// Numeric level used for seniority distance. Management tracks sit on the same
    /// ladder as their IC counterparts (manager ≈ staff, director ≈ principal).
    pub fn level(self) -> u8 {
        match self {
            RoleCategory::Entry => 0,
            RoleCategory::Mid => 1,
            RoleCategory::Senior => 2,
            RoleCategory::Staff | RoleCategory::Manager => 3,
            RoleCategory::Principal | RoleCategory::Director => 4,
            RoleCategory::Executive => 5,
        }
    }

    /// Classifies a free-text job title. Unrecognized titles land on `Mid`.
    pub fn from_title(title: &str) -> Self {
        let t = title.to_lowercase();
        let has = |needle: &str| t.split(|c: char| !c.is_alphanumeric()).any(|w| w == needle);

        if has("cto") || has("ceo") || has("vp") || has("chief") || t.contains("vice president")
        {
            RoleCategory::Executive
        } else if has("director") || t.contains("head of") {
            RoleCategory::Director
        } else if has("manager") {
            RoleCategory::Manager
        } else if has("principal") || has("distinguished") {
            RoleCategory::Principal
        } else if has("staff") || has("lead") || has("architect") {
            RoleCategory::Staff
        } else if has("senior") || has("sr") {
            RoleCategory::Senior
        } else if has("junior") || has("jr") || has("intern") || has("graduate") || has("associate")
        {
            RoleCategory::Entry
        } else {
            RoleCategory::Mid
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RoleCategory::Entry => "entry-level",
            RoleCategory::Mid => "mid-level",
            RoleCategory::Senior => "senior",
            RoleCategory::Staff => "staff",
            RoleCategory::Principal => "principal",
            RoleCategory::Manager => "engineering manager",
            RoleCategory::Director => "director",
            RoleCategory::Executive => "executive",
        }
    }
}

/// What a job posting asks for. Produced upstream and treated as read-only input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementProfile {
    pub role_category: RoleCategory,
    pub competency_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub required_keywords: BTreeSet<String>,
    #[serde(default)]
    pub nice_to_have_keywords: BTreeSet<String>,
    #[serde(default)]
    pub inferred_responsibilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("competency_weights is empty")]
    NoCompetencies,

    #[error("competency '{competency}' has invalid weight {weight}")]
    InvalidWeight { competency: String, weight: f64 },

    #[error("competency_weights sum to {sum:.3}, expected 1.0 ± {WEIGHT_SUM_EPSILON}")]
    WeightSum { sum: f64 },
}

impl RequirementProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.competency_weights.is_empty() {
            return Err(ProfileError::NoCompetencies);
        }
        for (competency, &weight) in &self.competency_weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ProfileError::InvalidWeight {
                    competency: competency.clone(),
                    weight,
                });
            }
        }
        let sum: f64 = self.competency_weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ProfileError::WeightSum { sum });
        }
        Ok(())
    }

    /// Every term the profile asks about: competencies plus both keyword sets.
    pub fn watched_terms(&self) -> BTreeSet<String> {
        self.competency_weights
            .keys()
            .chain(self.required_keywords.iter())
            .chain(self.nice_to_have_keywords.iter())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Independently scored quality axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    FactualGrounding,
    KeywordCoverage,
    SeniorityAlignment,
    LengthCompliance,
    StructuralCompleteness,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::FactualGrounding,
        Dimension::KeywordCoverage,
        Dimension::SeniorityAlignment,
        Dimension::LengthCompliance,
        Dimension::StructuralCompleteness,
    ];
}

/// Where a grounding rejection happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationStage {
    RoleBullets,
    Summary,
    SkillCategories,
}

/// A rejected piece of generated content. Kept for audit even when the run passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingViolation {
    pub stage: ViolationStage,
    pub role_id: Option<Uuid>,
    pub attempt: u8,
    pub text: String,
    pub reasons: Vec<String>,
}

/// What the improver should do about a deficiency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Remedy {
    /// Re-run per-role generation, emphasising these keywords where the source supports them.
    RegenerateRoles {
        role_ids: Vec<Uuid>,
        priority_keywords: Vec<String>,
    },
    /// Re-run per-role generation asking for one more bullet per role.
    ExpandRoles { role_ids: Vec<Uuid> },
    /// Re-run per-role generation with seniority verb emphasis.
    EmphasizeSeniority { role_ids: Vec<Uuid> },
    /// Re-stitch against a smaller bullet budget.
    Restitch { bullet_budget: usize },
    /// Remove specific bullets and re-stitch.
    DropBullets { bullet_ids: Vec<Uuid> },
    RegenerateSummary,
    RegenerateSkillCategories,
    /// Nothing the pipeline can do from the available source material.
    Unresolvable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deficiency {
    pub dimension: Dimension,
    pub score: f64,
    pub target: f64,
    pub floor_violated: bool,
    pub reason: String,
    pub suggested_fix: String,
    pub remedies: Vec<Remedy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    pub report_id: Uuid,
    /// Number of improvement passes applied before this grading.
    pub iteration: u32,
    pub dimension_scores: BTreeMap<Dimension, f64>,
    pub composite_score: f64,
    /// Worst first.
    pub deficiencies: Vec<Deficiency>,
    pub grounding_violations: Vec<GroundingViolation>,
    pub pass: bool,
    pub graded_at: DateTime<Utc>,
}

impl GradeReport {
    pub fn score(&self, dimension: Dimension) -> f64 {
        self.dimension_scores.get(&dimension).copied().unwrap_or(0.0)
    }

    pub fn floor_violations(&self) -> impl Iterator<Item = &Deficiency> {
        self.deficiencies.iter().filter(|d| d.floor_violated)
    }
}

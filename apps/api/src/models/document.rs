use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whitespace-delimited word count used for every budget computation.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// One accepted narrative statement for a role.
///
/// CRITICAL: `cited_skills` is always a subset of the source role's `skill_tags`, held in
/// the source's spelling. Bullets are never edited after acceptance; improvement replaces
/// a role's whole bullet list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedBullet {
    pub bullet_id: Uuid,
    pub role_id: Uuid,
    pub text: String,
    pub cited_skills: Vec<String>,
    pub estimated_word_count: usize,
    pub relevance_score: f64,
    /// Which generation attempt (1 or 2) produced this bullet.
    pub attempt: u8,
}

/// A role's slot in the assembled document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSection {
    pub role_id: Uuid,
    pub employer: String,
    pub title: String,
    pub bullets: Vec<GeneratedBullet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillCategory {
    pub name: String,
    pub skills: Vec<String>,
}

/// Skill groupings, tagged by where they came from. `Default` is the fixed lexicon
/// fallback used when generated output was malformed or ungroundable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "categories", rename_all = "snake_case")]
pub enum SkillCategories {
    Generated(Vec<SkillCategory>),
    Default(Vec<SkillCategory>),
}

impl SkillCategories {
    pub fn categories(&self) -> &[SkillCategory] {
        match self {
            SkillCategories::Generated(c) | SkillCategories::Default(c) => c,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, SkillCategories::Generated(_))
    }

    pub fn all_skills(&self) -> impl Iterator<Item = &str> {
        self.categories()
            .iter()
            .flat_map(|c| c.skills.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.all_skills().next().is_none()
    }
}

impl Default for SkillCategories {
    fn default() -> Self {
        SkillCategories::Default(Vec::new())
    }
}

/// Target total length of a document, bullets plus summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBudget {
    pub min: usize,
    pub max: usize,
}

impl WordBudget {
    pub fn contains(&self, words: usize) -> bool {
        (self.min..=self.max).contains(&words)
    }
}

/// Deterministic change the stitcher made to satisfy the word budget or uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetAdjustment {
    /// Dropped as a duplicate of a higher-relevance bullet.
    DuplicateDropped { bullet_id: Uuid, kept_bullet_id: Uuid },
    /// Floor bullet removed whole because the floor alone exceeded the budget.
    FloorTruncated { bullet_id: Uuid, role_id: Uuid },
    /// Ranked bullet skipped because it did not fit the remaining budget.
    SkippedOverBudget { bullet_id: Uuid, words: usize },
    /// Not enough grounded material to reach the minimum.
    Shortfall { total_words: usize, min_words: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchedDocument {
    /// Recency-ordered, most recent role first.
    pub sections: Vec<RoleSection>,
    pub summary_text: String,
    pub skill_categories: SkillCategories,
    /// Bullet words plus summary words.
    pub total_word_count: usize,
    /// Word budget the bullets were stitched against.
    pub bullet_budget: usize,
    pub budget_adjustments: Vec<BudgetAdjustment>,
}

impl StitchedDocument {
    pub fn bullets(&self) -> impl Iterator<Item = &GeneratedBullet> {
        self.sections.iter().flat_map(|s| s.bullets.iter())
    }

    pub fn bullet_word_count(&self) -> usize {
        self.bullets().map(|b| b.estimated_word_count).sum()
    }

    /// Replaces the summary and recomputes the total.
    pub fn with_summary(mut self, summary: String) -> Self {
        self.summary_text = summary;
        self.recount();
        self
    }

    pub fn recount(&mut self) {
        self.total_word_count = self.bullet_word_count() + word_count(&self.summary_text);
    }

    /// Everything a keyword scan should see, one block per line.
    pub fn full_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.summary_text.as_str()];
        parts.extend(self.bullets().map(|b| b.text.as_str()));
        parts.extend(self.skill_categories.all_skills());
        parts.join("\n")
    }

    pub fn section_for(&self, role_id: Uuid) -> Option<&RoleSection> {
        self.sections.iter().find(|s| s.role_id == role_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(text: &str) -> GeneratedBullet {
        GeneratedBullet {
            bullet_id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            text: text.to_string(),
            cited_skills: vec![],
            estimated_word_count: word_count(text),
            relevance_score: 0.5,
            attempt: 1,
        }
    }

    #[test]
    fn test_word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  Cut   latency\tby 40%  "), 4);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_with_summary_recounts_total() {
        let doc = StitchedDocument {
            sections: vec![RoleSection {
                role_id: Uuid::new_v4(),
                employer: "Acme".to_string(),
                title: "Engineer".to_string(),
                bullets: vec![bullet("Built the ingest pipeline in Rust")],
            }],
            summary_text: String::new(),
            skill_categories: SkillCategories::default(),
            total_word_count: 6,
            bullet_budget: 100,
            budget_adjustments: vec![],
        };
        let doc = doc.with_summary("Senior engineer with 8 years".to_string());
        assert_eq!(doc.total_word_count, 6 + 5);
    }

    #[test]
    fn test_skill_categories_serde_is_tagged() {
        let cats = SkillCategories::Generated(vec![SkillCategory {
            name: "Cloud".to_string(),
            skills: vec!["AWS".to_string()],
        }]);
        let json = serde_json::to_value(&cats).unwrap();
        assert_eq!(json["source"], "generated");
        assert_eq!(json["categories"][0]["skills"][0], "AWS");
    }

    #[test]
    fn test_empty_default_categories_report_empty() {
        assert!(SkillCategories::default().is_empty());
        assert!(!SkillCategories::default().is_generated());
    }
}

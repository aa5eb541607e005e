use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::RoleCategory;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePeriod {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// One employer/period of a candidate's career, exactly as stored upstream.
///
/// Ground truth: the pipeline never writes to a RoleBlock and never fills in a field
/// the store left empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleBlock {
    pub role_id: Uuid,
    #[serde(default)]
    pub employer: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub period: RolePeriod,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub skill_tags: BTreeSet<String>,
    #[serde(default)]
    pub is_current: bool,
}

impl RoleBlock {
    /// All achievement statements joined into the text numeric claims are checked against.
    pub fn source_text(&self) -> String {
        self.achievements.join("\n")
    }

    pub fn has_achievements(&self) -> bool {
        self.achievements.iter().any(|a| !a.trim().is_empty())
    }

    pub fn is_partial(&self) -> bool {
        self.employer.trim().is_empty()
            || self.title.trim().is_empty()
            || self.period.start.is_none()
            || self.skill_tags.is_empty()
            || !self.has_achievements()
    }

    pub fn category(&self) -> RoleCategory {
        RoleCategory::from_title(&self.title)
    }

    /// Returns the source spelling of `skill` if this role carries it (case-insensitive).
    pub fn canonical_skill(&self, skill: &str) -> Option<&str> {
        let needle = skill.trim();
        self.skill_tags
            .iter()
            .find(|tag| tag.eq_ignore_ascii_case(needle))
            .map(String::as_str)
    }
}

/// Union of every role's skill tags; the only skills the document may ever list.
pub fn skill_union(roles: &[RoleBlock]) -> BTreeSet<String> {
    let mut union: BTreeSet<String> = BTreeSet::new();
    for role in roles {
        for tag in &role.skill_tags {
            if !union.iter().any(|u| u.eq_ignore_ascii_case(tag)) {
                union.insert(tag.clone());
            }
        }
    }
    union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_skill_tags_default_to_empty_set() {
        let role: RoleBlock = serde_json::from_value(serde_json::json!({
            "role_id": Uuid::new_v4(),
            "employer": "Acme",
            "title": "Engineer",
            "achievements": ["Shipped the billing service"]
        }))
        .unwrap();
        assert!(role.skill_tags.is_empty());
        assert!(role.location.is_none());
        assert!(role.period.start.is_none());
        assert!(role.is_partial());
    }

    #[test]
    fn test_canonical_skill_is_case_insensitive() {
        let role = RoleBlock {
            role_id: Uuid::new_v4(),
            employer: "Acme".to_string(),
            title: "Engineer".to_string(),
            period: RolePeriod::default(),
            location: None,
            achievements: vec![],
            skill_tags: ["Kubernetes".to_string()].into_iter().collect(),
            is_current: false,
        };
        assert_eq!(role.canonical_skill("kubernetes"), Some("Kubernetes"));
        assert_eq!(role.canonical_skill("docker"), None);
    }

    #[test]
    fn test_skill_union_dedups_case_variants() {
        let mk = |tags: &[&str]| RoleBlock {
            role_id: Uuid::new_v4(),
            employer: String::new(),
            title: String::new(),
            period: RolePeriod::default(),
            location: None,
            achievements: vec![],
            skill_tags: tags.iter().map(|t| t.to_string()).collect(),
            is_current: false,
        };
        let union = skill_union(&[mk(&["AWS", "Python"]), mk(&["aws", "Java"])]);
        assert_eq!(union.len(), 3);
        assert!(union.contains("AWS"));
    }
}

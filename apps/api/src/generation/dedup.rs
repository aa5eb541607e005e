//! Near-duplicate detection across roles.
//!
//! Two bullets are duplicates when they cite at least `min_shared_skills` common skills
//! AND their outcome-verb patterns overlap by at least `min_pattern_similarity` (Jaccard).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::grounding::claims::numeric_claims;
use crate::models::document::GeneratedBullet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub min_shared_skills: usize,
    pub min_pattern_similarity: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_shared_skills: 2,
            min_pattern_similarity: 0.5,
        }
    }
}

const OUTCOME_VERBS: &[&str] = &[
    "reduce", "cut", "decrease", "lower", "increase", "improve", "boost", "grow", "raise",
    "save", "accelerate", "speed", "scale", "migrate", "automate", "launch", "deliver",
    "eliminate", "consolidate", "modernize", "streamline", "optimize",
];

const OUTCOME_NOUNS: &[&str] = &[
    "latency", "cost", "revenue", "throughput", "uptime", "availability", "downtime",
    "error", "incident", "reliability", "performance", "deployment", "onboarding", "traffic",
    "conversion", "churn", "spend", "time",
];

/// Crude suffix stripping so "reduced", "reduces", "reducing" and "reduce" agree.
fn stem(word: &str) -> String {
    let w = word.to_lowercase();
    let len = w.chars().count();
    let stripped = if len > 5 && w.ends_with("ing") {
        &w[..w.len() - 3]
    } else if len > 4 && w.ends_with("ed") {
        &w[..w.len() - 2]
    } else if len > 4 && w.ends_with("es") {
        &w[..w.len() - 2]
    } else if len > 3 && w.ends_with('s') && !w.ends_with("ss") {
        &w[..w.len() - 1]
    } else {
        &w
    };
    let stripped = if stripped.chars().count() > 3 && stripped.ends_with('e') {
        &stripped[..stripped.len() - 1]
    } else {
        stripped
    };
    stripped.to_string()
}

/// Lead verb, outcome verbs and nouns, and the kinds of metric the text claims.
pub fn outcome_pattern(text: &str) -> BTreeSet<String> {
    let verbs: BTreeSet<String> = OUTCOME_VERBS.iter().map(|v| stem(v)).collect();
    let nouns: BTreeSet<String> = OUTCOME_NOUNS.iter().map(|n| stem(n)).collect();

    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && w.chars().all(char::is_alphabetic))
        .map(stem)
        .collect();

    let mut pattern = BTreeSet::new();
    if let Some(lead) = words.first() {
        pattern.insert(lead.clone());
    }
    for w in &words {
        if verbs.contains(w) || nouns.contains(w) {
            pattern.insert(w.clone());
        }
    }
    for claim in numeric_claims(text) {
        let kind = if claim.ends_with('%') {
            "metric:percent"
        } else if claim.ends_with('x') {
            "metric:multiple"
        } else if claim.starts_with(['$', '€', '£']) {
            "metric:currency"
        } else {
            "metric:count"
        };
        pattern.insert(kind.to_string());
    }
    pattern
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn shared_skills(a: &GeneratedBullet, b: &GeneratedBullet) -> usize {
    a.cited_skills
        .iter()
        .filter(|s| b.cited_skills.iter().any(|t| t.eq_ignore_ascii_case(s)))
        .count()
}

pub fn is_duplicate(a: &GeneratedBullet, b: &GeneratedBullet, config: &DedupConfig) -> bool {
    if shared_skills(a, b) < config.min_shared_skills {
        return false;
    }
    jaccard(&outcome_pattern(&a.text), &outcome_pattern(&b.text)) >= config.min_pattern_similarity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::word_count;
    use uuid::Uuid;

    fn bullet(text: &str, skills: &[&str]) -> GeneratedBullet {
        GeneratedBullet {
            bullet_id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            text: text.to_string(),
            cited_skills: skills.iter().map(|s| s.to_string()).collect(),
            estimated_word_count: word_count(text),
            relevance_score: 0.5,
            attempt: 1,
        }
    }

    #[test]
    fn test_stem_folds_inflections() {
        assert_eq!(stem("reduced"), stem("reducing"));
        assert_eq!(stem("reduces"), stem("reduce"));
        assert_eq!(stem("Migrated"), stem("migrate"));
    }

    #[test]
    fn test_pattern_captures_metric_kind() {
        let p = outcome_pattern("Reduced API latency 40% on AWS");
        assert!(p.contains("metric:percent"));
        assert!(p.contains(&stem("latency")));
    }

    #[test]
    fn test_near_identical_outcomes_are_duplicates() {
        let a = bullet(
            "Reduced API latency 40% by migrating services to AWS and Kubernetes",
            &["AWS", "Kubernetes"],
        );
        let b = bullet(
            "Cut API latency by 40% migrating workloads onto Kubernetes on AWS",
            &["Kubernetes", "AWS"],
        );
        assert!(is_duplicate(&a, &b, &DedupConfig::default()));
    }

    #[test]
    fn test_shared_skills_alone_are_not_duplicates() {
        let a = bullet("Reduced API latency 40% on AWS and Kubernetes", &["AWS", "Kubernetes"]);
        let b = bullet("Mentored four engineers running AWS and Kubernetes on-call", &["AWS", "Kubernetes"]);
        assert!(!is_duplicate(&a, &b, &DedupConfig::default()));
    }

    #[test]
    fn test_similar_pattern_with_one_shared_skill_is_not_duplicate() {
        let a = bullet("Reduced latency 40% on AWS", &["AWS"]);
        let b = bullet("Reduced latency 40% on AWS", &["AWS"]);
        assert!(!is_duplicate(&a, &b, &DedupConfig::default()));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let a = bullet("Reduced latency 40% on AWS", &["AWS"]);
        let b = bullet("Reduced latency 40% on AWS", &["AWS"]);
        let loose = DedupConfig {
            min_shared_skills: 1,
            ..DedupConfig::default()
        };
        assert!(is_duplicate(&a, &b, &loose));
    }

    #[test]
    fn test_jaccard_of_empty_sets_is_zero() {
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }
}

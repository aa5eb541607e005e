use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::grounding::claims::contains_term;
use crate::models::document::GeneratedBullet;
use crate::models::profile::RequirementProfile;

/// Blend of the three overlap signals. Sums to 1.0 by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceWeights {
    pub competency: f64,
    pub required: f64,
    pub nice_to_have: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            competency: 0.6,
            required: 0.3,
            nice_to_have: 0.1,
        }
    }
}

/// A term is hit when it is cited, appears as a whole word, or (for multi-word
/// competencies) has at least half of its significant words appear.
fn term_hit(text: &str, cited_skills: &[String], term: &str) -> bool {
    if cited_skills.iter().any(|s| s.eq_ignore_ascii_case(term)) || contains_term(text, term) {
        return true;
    }
    let words: Vec<&str> = term
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .collect();
    if words.len() < 2 {
        return false;
    }
    let hits = words.iter().filter(|w| contains_term(text, w)).count();
    hits * 2 >= words.len()
}

fn keyword_fraction(text: &str, cited: &[String], keywords: impl ExactSizeIterator<Item = impl AsRef<str>>) -> f64 {
    let total = keywords.len();
    if total == 0 {
        return 0.0;
    }
    let hits = keywords.filter(|k| term_hit(text, cited, k.as_ref())).count();
    hits as f64 / total as f64
}

/// Weighted overlap between a statement and the profile. 0.0 – 1.0.
///
/// competency part = Σ weight of hit competencies (weights already sum to 1.0);
/// keyword parts = fraction of each keyword set hit.
pub fn score_relevance(
    text: &str,
    cited_skills: &[String],
    profile: &RequirementProfile,
    weights: &RelevanceWeights,
) -> f64 {
    let competency: f64 = profile
        .competency_weights
        .iter()
        .filter(|(term, _)| term_hit(text, cited_skills, term))
        .map(|(_, w)| *w)
        .sum();
    let required = keyword_fraction(text, cited_skills, profile.required_keywords.iter());
    let nice = keyword_fraction(text, cited_skills, profile.nice_to_have_keywords.iter());

    (weights.competency * competency.min(1.0)
        + weights.required * required
        + weights.nice_to_have * nice)
        .clamp(0.0, 1.0)
}

/// A bullet plus the tie-break keys the stitcher ranks on.
#[derive(Debug, Clone)]
pub struct RankedBullet {
    pub bullet: GeneratedBullet,
    /// Index of the source role in recency order (0 = most recent).
    pub role_rank: usize,
    /// Index within the role's own bullet list.
    pub position: usize,
}

/// Relevance descending; ties go to the more recent role, then earlier position.
pub fn rank_order(a: &RankedBullet, b: &RankedBullet) -> Ordering {
    b.bullet
        .relevance_score
        .partial_cmp(&a.bullet.relevance_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.role_rank.cmp(&b.role_rank))
        .then_with(|| a.position.cmp(&b.position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::RoleCategory;
    use uuid::Uuid;

    fn profile() -> RequirementProfile {
        RequirementProfile {
            role_category: RoleCategory::Senior,
            competency_weights: [("cloud infrastructure".to_string(), 0.5), ("Python".to_string(), 0.5)]
                .into_iter()
                .collect(),
            required_keywords: ["AWS".to_string(), "Kubernetes".to_string()].into_iter().collect(),
            nice_to_have_keywords: ["Terraform".to_string()].into_iter().collect(),
            inferred_responsibilities: vec![],
        }
    }

    #[test]
    fn test_full_overlap_scores_high() {
        let cited = vec!["AWS".to_string(), "Python".to_string()];
        let score = score_relevance(
            "Built Python cloud infrastructure on AWS and Kubernetes with Terraform",
            &cited,
            &profile(),
            &RelevanceWeights::default(),
        );
        assert!((score - 1.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_no_overlap_scores_zero() {
        let score = score_relevance(
            "Organized the team offsite",
            &[],
            &profile(),
            &RelevanceWeights::default(),
        );
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_multi_word_competency_partial_word_hit() {
        // "infrastructure" alone is half of "cloud infrastructure"
        let score = score_relevance(
            "Rebuilt deployment infrastructure",
            &[],
            &profile(),
            &RelevanceWeights::default(),
        );
        assert!((score - 0.3).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_rank_order_breaks_ties_by_recency() {
        let mk = |score: f64, rank: usize| RankedBullet {
            bullet: GeneratedBullet {
                bullet_id: Uuid::new_v4(),
                role_id: Uuid::new_v4(),
                text: String::new(),
                cited_skills: vec![],
                estimated_word_count: 0,
                relevance_score: score,
                attempt: 1,
            },
            role_rank: rank,
            position: 0,
        };
        let mut items = vec![mk(0.5, 2), mk(0.9, 1), mk(0.5, 0)];
        items.sort_by(rank_order);
        let ranks: Vec<usize> = items.iter().map(|i| i.role_rank).collect();
        assert_eq!(ranks, vec![1, 0, 2]);
    }
}

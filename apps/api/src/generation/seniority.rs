//! Seniority calibration. Maps the requested role category to the verb register a
//! document should carry. Used as prompt guidance and by the grader's heuristic.
//!
//! CRITICAL: guidance only ever changes phrasing. It never licenses a claim the source
//! doesn't make; grounding still applies to every word.

use crate::grounding::claims::contains_term;
use crate::models::profile::RoleCategory;

/// Verb sets calibrated to a role category.
#[derive(Debug, Clone)]
pub struct SeniorityLens {
    pub expected_verbs: Vec<&'static str>,
    pub avoid_verbs: Vec<&'static str>,
}

pub fn lens_for(category: RoleCategory) -> SeniorityLens {
    match category {
        RoleCategory::Entry | RoleCategory::Mid => SeniorityLens {
            expected_verbs: vec![
                "Built",
                "Implemented",
                "Developed",
                "Shipped",
                "Delivered",
                "Automated",
                "Tested",
            ],
            avoid_verbs: vec!["spearheaded", "set strategy", "directed"],
        },
        RoleCategory::Senior => SeniorityLens {
            expected_verbs: vec![
                "Designed",
                "Built",
                "Led",
                "Owned",
                "Delivered",
                "Optimized",
                "Mentored",
            ],
            avoid_verbs: vec!["assisted", "helped", "participated in"],
        },
        RoleCategory::Staff | RoleCategory::Principal => SeniorityLens {
            expected_verbs: vec![
                "Architected",
                "Led",
                "Defined",
                "Drove",
                "Designed",
                "Mentored",
                "Established",
            ],
            avoid_verbs: vec!["assisted", "helped", "participated in", "supported"],
        },
        RoleCategory::Manager | RoleCategory::Director | RoleCategory::Executive => {
            SeniorityLens {
                expected_verbs: vec![
                    "Led",
                    "Managed",
                    "Hired",
                    "Grew",
                    "Directed",
                    "Established",
                    "Mentored",
                ],
                avoid_verbs: vec!["assisted", "helped", "participated in"],
            }
        }
    }
}

/// Share of statements that open with (or contain) an expected verb, minus a penalty for
/// avoided verbs. 0.0 – 1.0; empty input scores 0.0.
pub fn verb_alignment<'a>(texts: impl IntoIterator<Item = &'a str>, lens: &SeniorityLens) -> f64 {
    let mut total = 0usize;
    let mut aligned = 0usize;
    let mut avoided = 0usize;

    for text in texts {
        total += 1;
        if lens.expected_verbs.iter().any(|v| contains_term(text, v)) {
            aligned += 1;
        }
        if lens.avoid_verbs.iter().any(|v| contains_term(text, v)) {
            avoided += 1;
        }
    }

    if total == 0 {
        return 0.0;
    }
    ((aligned as f64 - 0.5 * avoided as f64) / total as f64).clamp(0.0, 1.0)
}

/// 1.0 when the candidate's most senior held level matches the requested level, falling
/// by 0.25 per level of distance.
pub fn title_alignment(held: &[RoleCategory], requested: RoleCategory) -> f64 {
    let Some(highest) = held.iter().map(|c| c.level()).max() else {
        return 0.0;
    };
    let distance = (highest as i32 - requested.level() as i32).unsigned_abs() as f64;
    (1.0 - 0.25 * distance).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_lens_expects_architecture_verbs() {
        let lens = lens_for(RoleCategory::Staff);
        assert!(lens.expected_verbs.contains(&"Architected"));
    }

    #[test]
    fn test_verb_alignment_counts_expected_verbs() {
        let lens = lens_for(RoleCategory::Senior);
        let score = verb_alignment(
            ["Designed the ingest service", "Wrote docs for onboarding"],
            &lens,
        );
        assert!((score - 0.5).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn test_verb_alignment_penalizes_avoided_verbs() {
        let lens = lens_for(RoleCategory::Staff);
        let score = verb_alignment(["Helped the team with testing"], &lens);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_title_alignment_exact_match() {
        assert_eq!(
            title_alignment(&[RoleCategory::Mid, RoleCategory::Senior], RoleCategory::Senior),
            1.0
        );
    }

    #[test]
    fn test_title_alignment_distance_two() {
        assert_eq!(title_alignment(&[RoleCategory::Mid], RoleCategory::Staff), 0.5);
    }

    #[test]
    fn test_title_alignment_no_history() {
        assert_eq!(title_alignment(&[], RoleCategory::Senior), 0.0);
    }
}

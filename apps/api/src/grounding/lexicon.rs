//! Known technology names.
//!
//! The bucket lists drive the default skill categories. Every name outside
//! `ORDINARY_WORDS` is also watched by grounding, so generated text can only name a known
//! technology when its source does.

use std::collections::BTreeSet;

use crate::models::profile::RequirementProfile;

pub const LANGUAGES: &[&str] = &[
    "Rust", "Python", "Java", "Go", "Golang", "TypeScript", "JavaScript", "C", "C++", "C#",
    "Kotlin", "Scala", "Ruby", "Swift", "SQL", "Bash", "PHP", "Elixir", "Haskell",
];

pub const CLOUD_INFRA: &[&str] = &[
    "AWS", "GCP", "Azure", "Kubernetes", "Docker", "Terraform", "Helm", "Lambda", "EC2", "S3",
    "CloudFormation", "Ansible", "Linux", "Nginx", "Serverless", "OpenShift",
];

pub const DATA_STORAGE: &[&str] = &[
    "PostgreSQL", "Postgres", "MySQL", "Redis", "Kafka", "MongoDB", "DynamoDB",
    "Elasticsearch", "Spark", "Snowflake", "BigQuery", "Cassandra", "SQLite", "Airflow",
    "Hadoop",
];

/// Names that double as ordinary English ("at the helm", "a swift fix"). Bucketed, never watched.
const ORDINARY_WORDS: &[&str] = &[
    "Go", "C", "Ruby", "Swift", "Bash", "Helm", "Lambda", "Serverless", "Spark", "Snowflake",
];

/// Whether `list` carries `skill`, ignoring case.
pub fn lists(list: &[&str], skill: &str) -> bool {
    let skill = skill.trim();
    list.iter().any(|known| known.eq_ignore_ascii_case(skill))
}

/// Technology names specific enough to flag when they show up unsourced.
pub fn technology_terms() -> impl Iterator<Item = &'static str> {
    LANGUAGES
        .iter()
        .chain(CLOUD_INFRA)
        .chain(DATA_STORAGE)
        .copied()
        .filter(|term| !lists(ORDINARY_WORDS, term))
}

/// Everything grounding watches for in one run: the corpus skill union, every term the
/// profile asks about, and the known technology names. Lexicon names already present
/// in another spelling are not added twice.
pub fn watched_terms(
    skill_union: &BTreeSet<String>,
    profile: &RequirementProfile,
) -> BTreeSet<String> {
    let mut watched = skill_union.clone();
    watched.extend(profile.watched_terms());
    for term in technology_terms() {
        if !watched.iter().any(|w| w.eq_ignore_ascii_case(term)) {
            watched.insert(term.to_string());
        }
    }
    watched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture_profile;

    #[test]
    fn test_ambiguous_names_are_not_watched() {
        let terms: Vec<&str> = technology_terms().collect();
        assert!(terms.contains(&"GCP"));
        assert!(terms.contains(&"Golang"));
        assert!(!terms.contains(&"Go"));
        assert!(!terms.contains(&"Helm"));
    }

    #[test]
    fn test_watched_terms_keep_corpus_spelling() {
        let union: BTreeSet<String> = ["aws".to_string(), "Java".to_string()].into_iter().collect();
        let watched = watched_terms(&union, &fixture_profile());
        assert!(watched.contains("aws"));
        assert!(!watched.contains("AWS"));
        assert!(watched.contains("Terraform"));
        assert!(watched.contains("Rust"));
    }
}

//! Grounding Validator: a pluggable, trait-based check that generated text states only
//! facts present in its source material.
//!
//! Default: `StrictGroundingValidator` (skills, numbers, and unsourced technology terms).
//! Stages receive an `Arc<dyn GroundingValidator>` so rules can be swapped without
//! touching the orchestrator.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grounding::claims::{contains_term, numeric_claims, NumericIndex};

/// A piece of generated content awaiting validation.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub text: &'a str,
    pub cited_skills: &'a [String],
}

/// The ground truth a candidate is checked against.
#[derive(Debug, Clone)]
pub struct SourceFacts<'a> {
    /// Skills the candidate may cite.
    pub skill_tags: &'a BTreeSet<String>,
    /// Text the candidate's numbers must appear in verbatim.
    pub source_text: &'a str,
    /// Terms that count as unsourced if mentioned without support in tags or source text.
    pub watched_terms: &'a BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RejectionReason {
    EmptyText,
    UnsourcedSkill(String),
    UnsourcedNumber(String),
    UnsourcedTerm(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::EmptyText => write!(f, "empty text"),
            RejectionReason::UnsourcedSkill(s) => {
                write!(f, "cited skill '{s}' is not in the source skill tags")
            }
            RejectionReason::UnsourcedNumber(n) => {
                write!(f, "numeric claim '{n}' does not appear in the source text")
            }
            RejectionReason::UnsourcedTerm(t) => {
                write!(f, "mentions '{t}', which the source does not support")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub reasons: Vec<RejectionReason>,
    /// Cited skills rewritten to the source's spelling. Only meaningful when accepted.
    pub canonical_skills: Vec<String>,
}

impl ValidationResult {
    pub fn accepted(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reason_strings(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }
}

pub trait GroundingValidator: Send + Sync {
    fn validate(&self, candidate: &Candidate<'_>, facts: &SourceFacts<'_>) -> ValidationResult;

    fn name(&self) -> &'static str;
}

/// Rejects on any unsourced skill citation, numeric claim, or watched term.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictGroundingValidator;

impl GroundingValidator for StrictGroundingValidator {
    fn validate(&self, candidate: &Candidate<'_>, facts: &SourceFacts<'_>) -> ValidationResult {
        let mut reasons = Vec::new();
        let mut canonical_skills = Vec::new();

        if candidate.text.trim().is_empty() {
            reasons.push(RejectionReason::EmptyText);
        }

        for cited in candidate.cited_skills {
            match facts
                .skill_tags
                .iter()
                .find(|tag| tag.eq_ignore_ascii_case(cited.trim()))
            {
                Some(tag) => {
                    if !canonical_skills.contains(tag) {
                        canonical_skills.push(tag.clone());
                    }
                }
                None => reasons.push(RejectionReason::UnsourcedSkill(cited.clone())),
            }
        }

        let index = NumericIndex::from_text(facts.source_text);
        for claim in numeric_claims(candidate.text) {
            if !index.supports(&claim) {
                let reason = RejectionReason::UnsourcedNumber(claim);
                if !reasons.contains(&reason) {
                    reasons.push(reason);
                }
            }
        }

        for term in facts.watched_terms {
            if !contains_term(candidate.text, term) {
                continue;
            }
            let tagged = facts
                .skill_tags
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(term));
            if !tagged && !contains_term(facts.source_text, term) {
                reasons.push(RejectionReason::UnsourcedTerm(term.clone()));
            }
        }

        ValidationResult {
            reasons,
            canonical_skills,
        }
    }

    fn name(&self) -> &'static str {
        "strict"
    }
}

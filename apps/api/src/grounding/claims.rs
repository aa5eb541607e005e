//! Claim extraction used by grounding checks: numeric claims and whole-word term hits.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Numbers with an optional currency prefix and unit suffix: `40%`, `$2M`, `3x`, `10+`,
/// `1,200`, `12 percent`.
fn numeric_claim_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[$€£]?\d+(?:[.,]\d+)*(?:\s?(?:%|percent\b|x\b|k\b|m\b|b\b|\+))?")
            .expect("numeric claim pattern is valid")
    })
}

/// Normalized form used for verbatim comparison: lowercase, no inner whitespace,
/// "percent" folded into `%`.
fn normalize_claim(raw: &str) -> String {
    raw.to_lowercase()
        .replace("percent", "%")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Numeric part of a normalized claim, without currency or unit.
fn number_part(claim: &str) -> &str {
    let start = claim
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(claim.len());
    let rest = &claim[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Extracts numeric claims from free text. Digits glued to a preceding letter
/// (`S3`, `EC2`, `k8s`) are product names, not claims, and are skipped.
pub fn numeric_claims(text: &str) -> Vec<String> {
    numeric_claim_re()
        .find_iter(text)
        .filter(|m| {
            text[..m.start()]
                .chars()
                .next_back()
                .map(|c| !c.is_alphabetic())
                .unwrap_or(true)
        })
        .map(|m| normalize_claim(m.as_str()))
        .collect()
}

/// Verbatim index of the numeric claims a source text supports.
#[derive(Debug, Clone, Default)]
pub struct NumericIndex {
    claims: BTreeSet<String>,
    numbers: BTreeSet<String>,
}

impl NumericIndex {
    pub fn from_text(text: &str) -> Self {
        let claims: BTreeSet<String> = numeric_claims(text).into_iter().collect();
        let numbers = claims.iter().map(|c| number_part(c).to_string()).collect();
        Self { claims, numbers }
    }

    /// A claim with a unit must match a source claim exactly; a bare number may match
    /// the numeric part of any source claim (`40` is supported by `40%`).
    pub fn supports(&self, claim: &str) -> bool {
        if self.claims.contains(claim) {
            return true;
        }
        let number = number_part(claim);
        number == claim && self.numbers.contains(number)
    }
}

/// Whole-word, case-insensitive term search. Terms of three characters or fewer
/// (`Go`, `AWS`, `R`) match case-sensitively so ordinary words don't trip them.
pub fn contains_term(text: &str, term: &str) -> bool {
    let term = term.trim();
    if term.is_empty() {
        return false;
    }
    let case_sensitive = term.chars().count() <= 3;
    let (haystack, needle) = if case_sensitive {
        (text.to_string(), term.to_string())
    } else {
        (text.to_lowercase(), term.to_lowercase())
    };

    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        if before_ok && after_ok {
            return true;
        }
        from = start
            + haystack[start..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
    }
    false
}

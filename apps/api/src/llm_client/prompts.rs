// Shared prompt constants and prompt-building utilities.
// Each stage that needs generation defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction prepended to all narrative generation prompts.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every statement you write must be supported by the SOURCE block below. \
    You may rephrase, prioritize, and select. You may NOT introduce metrics, \
    technologies, employers, or outcomes that are absent from the source. \
    Numbers must be copied exactly as they appear in the source. \
    If the source does not support a claim, omit it entirely.";

/// Instruction restricting cited skills to the provided tag list.
pub const SKILL_CITATION_INSTRUCTION: &str = "\
    CRITICAL: `cited_skills` may only contain values from the SKILL TAGS list, spelled \
    exactly as given. A skill mentioned in the text must also be cited. Never cite or \
    mention a skill that is not in the list, even if the job profile asks for it.";

/// Renders a bullet list for prompt bodies; `(none)` when empty.
pub fn bullet_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let lines: Vec<String> = items.into_iter().map(|i| format!("- {i}")).collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

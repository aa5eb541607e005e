// All LLM prompt templates for the generation stages.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for per-role bullet generation.
pub const ROLE_BULLETS_SYSTEM: &str = "You are an expert resume writer turning verified \
    achievement records into concise, factual resume bullets. \
    You MUST respond with valid JSON only: a JSON array of bullet objects. \
    Do NOT include any text outside the JSON array. \
    Do NOT use markdown code fences. \
    Do NOT invent facts not present in the source.";

/// Per-role bullet prompt.
/// Replace: {grounding_instruction}, {skill_instruction}, {employer}, {title},
///          {achievements}, {skill_tags}, {bullets_wanted}, {competencies},
///          {required_keywords}, {responsibilities}, {seniority_verbs}, {avoid_verbs},
///          {priority_section}, {feedback_section}
pub const ROLE_BULLETS_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

{skill_instruction}

ROLE: {title} at {employer}

SOURCE (achievements; the only facts you may use):
{achievements}

SKILL TAGS (the only skills you may cite or mention):
{skill_tags}

TARGET ROLE COMPETENCIES (weight in parentheses; use as a relevance lens only):
{competencies}

REQUIRED KEYWORDS (include verbatim only where the source supports them):
{required_keywords}

RESPONSIBILITIES of the target role:
{responsibilities}

SENIORITY REGISTER: prefer opening verbs such as {seniority_verbs}. Avoid {avoid_verbs}.
{priority_section}{feedback_section}
Write exactly {bullets_wanted} bullets, most relevant first. Return a JSON ARRAY:
[
  {
    "text": "Cut API latency 40% by moving hot paths to AWS Lambda",
    "cited_skills": ["AWS"]
  }
]

HARD RULES:
1. One achievement per bullet, 12 to 25 words, no trailing period
2. Copy every number exactly as it appears in the source
3. `cited_skills` lists every SKILL TAG the bullet mentions and nothing else
4. Never mention a technology, employer, or outcome absent from the source"#;

/// Inserted when the improver flags keywords for this role.
/// Replace: {keywords}
pub const PRIORITY_KEYWORDS_TEMPLATE: &str = r#"
PRIORITY KEYWORDS: the source supports these keywords but the previous draft omitted them. Work each one in, verbatim:
{keywords}
"#;

/// Inserted when the improver asks for stronger seniority signal.
pub const SENIORITY_EMPHASIS: &str = "\nSENIORITY EMPHASIS: lead every bullet with a verb \
    from the seniority register above, favouring scope and ownership the source states.\n";

/// Inserted on the single regeneration after a rejected attempt.
/// Replace: {reasons}
pub const REGENERATION_FEEDBACK_TEMPLATE: &str = r#"
YOUR PREVIOUS ATTEMPT WAS REJECTED for these reasons. Do not repeat them:
{reasons}
"#;

/// Summary prompt. Facts come from the aggregate only, never from bullets.
/// Replace: {grounding_instruction}, {facts}, {skills}, {role_category}, {max_words},
///          {feedback_section}
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Write a professional summary for a candidate targeting a {role_category} role.

SOURCE (aggregate career facts; the only facts you may state):
{facts}

SKILLS the candidate has (mention at most four, only from this list):
{skills}
{feedback_section}
Return a JSON object:
{
  "summary": "Senior engineer with 8 years across 3 employers building AWS and Python services"
}

HARD RULES:
1. At most {max_words} words, one or two sentences
2. The only numbers allowed are the ones in the SOURCE block
3. Do not name employers"#;

/// Skill category prompt.
/// Replace: {skills}, {competencies}, {feedback_section}
pub const SKILL_CATEGORIES_PROMPT_TEMPLATE: &str = r#"Group the candidate's skills into 3 or 4 named categories that mirror what the target role values.

CANDIDATE SKILLS (use only these, spelled exactly as given):
{skills}

TARGET ROLE COMPETENCIES (weight in parentheses):
{competencies}
{feedback_section}
Return a JSON ARRAY:
[
  {"name": "Cloud Platforms", "skills": ["AWS", "Kubernetes"]},
  {"name": "Languages", "skills": ["Python"]}
]

HARD RULES:
1. 3 or 4 categories, each with a short unique name and at least one skill
2. Every skill must come from CANDIDATE SKILLS; do NOT add related or implied skills
3. A skill appears in at most one category"#;

/// Deterministic seniority assessment used by the grader.
/// Replace: {role_category}, {titles}, {bullets}
pub const SENIORITY_ASSESSMENT_PROMPT_TEMPLATE: &str = r#"Rate how well this resume reads for a {role_category} role. Judge scope, ownership, and verb choice only; do not judge formatting.

TITLES HELD (most recent first):
{titles}

BULLETS:
{bullets}

Return a JSON object:
{
  "score": 72,
  "rationale": "One sentence"
}

`score` is an integer from 0 to 100."#;

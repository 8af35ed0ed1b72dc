//! Evaluation prompt for CV screening.
//!
//! The prompt is rendered once per run (one role per folder) and reused for
//! every document. Its layout:
//! 1. Evaluator framing and calibration for the role
//! 2. Criteria, strict scoring behavior, consistency rules, red flags
//! 3. Scoring bands and the pass rule
//! 4. The JSON shape the answer must take
//!
//! The CV text and a short format reminder are appended per document by
//! [`compose_request`].

use std::fmt;

/// A rendered evaluation prompt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationPrompt {
    role: String,
    text: String,
}

impl EvaluationPrompt {
    /// The role the prompt was rendered for.
    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for EvaluationPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render the evaluation prompt for a job role.
///
/// Pure and deterministic: the same role always yields the same prompt.
/// The role is embedded verbatim, without validation.
pub fn build_evaluation_prompt(role: &str) -> EvaluationPrompt {
    let text = format!(
        r#"
You are a strict, detail-oriented senior HR evaluator and technical hiring reviewer assessing CVs for the role of "{role}".

Your responsibility is NOT to be polite. Your responsibility is to be accurate, critical, and consistent across all candidates.

Before scoring, internally infer realistic hiring expectations for "{role}" based on industry standards.
You must calibrate expectations based on role seniority implied by the job title (e.g., intern, fresher, junior, middle, senior).

Based on the job role, evaluate each CV considering:
- Educational qualifications relevant to {role}
- Job history and experience relevant to {role}
- Skills that match {role} requirements
- Practical real-world readiness for the position
- Signal vs noise (ignore irrelevant achievements)

Evaluation Criteria:
1. Educational Qualification: Assess ONLY education that contributes to real capability for {role}. Do not overvalue degrees without demonstrated relevance.
2. Job History: Evaluate impact, responsibilities, technologies used, and relevance. Penalize vague descriptions or inflated titles without substance.
3. Skill Set: Identify proven, demonstrated skills. Do NOT assume skills that are not explicitly supported by evidence in the CV.
4. Level Detection: Infer candidate level strictly based on demonstrated experience:
   - intern
   - fresher
   - junior
   - middle
   - senior
5. Score: Rate the candidate from 0-100 based on realistic hiring standards for {role}.
6. Pass Decision:
   - TRUE if realistically hireable or worth moving to next round
   - FALSE if lacking core requirements or too weak
7. Justification: Provide a concise but critical explanation highlighting both strengths AND gaps.

STRICT SCORING BEHAVIOR (VERY IMPORTANT):
- Default mindset is skeptical, not optimistic.
- Do NOT give high scores unless strong evidence exists.
- Missing key skills MUST significantly reduce score.
- Generic CVs or unclear impact MUST be penalized.
- Avoid score inflation; most candidates should fall between 50 and 80 unless clearly exceptional.
- Junior roles should reward learning potential and relevant projects, but still require concrete signals.
- Years of experience alone must NOT increase score without relevance or demonstrated outcomes.

Consistency Rules:
- Evaluate ALL candidates using the SAME internal criteria derived from "{role}".
- Do NOT change standards between CVs.
- Do NOT be influenced by writing style, formatting, or length of CV.
- Ignore personal identifiers and avoid bias related to gender, ethnicity, age, nationality, or non-job-related traits.

Red Flags (penalize when present):
- Buzzword-heavy descriptions without measurable outcomes
- Skills listed without context or usage
- Irrelevant job history dominating the CV
- Overly generic summaries

Scoring Guidelines for {role}:
- 90-100: Exceptional and highly competitive candidate with strong, proven relevance
- 80-89: Strong candidate with clear alignment and credible experience
- 70-79: Solid candidate but with noticeable gaps
- 60-69: Moderate alignment; lacks depth or consistency
- 50-59: Weak alignment; limited or indirect relevance
- 0-49: Not suitable for the role

PASS DECISION RULE:
- pass = true typically when score >= 70 AND core skills exist
- pass = false when major gaps exist even if formatting looks good

IMPORTANT:
- Be objective and fair in your evaluation
- Consider the role level appropriately
- Focus on relevance to {role} rather than years of experience alone
- Avoid bias based on gender, ethnicity, age, or other protected characteristics
- Provide constructive but honest feedback in the justification

Please return your evaluation of the candidate for "{role}" in strict JSON format with the following structure:
{{
  "educationalQualification": "<summary of educational qualifications>",
  "jobHistory": "<summary of job history and experience>",
  "skillSet": "<comma-separated list of relevant skills>",
  "level": "<intern | fresher | junior | middle | senior>",
  "score": <integer between 0-100>,
  "pass": <true or false>,
  "justification": "<brief explanation of the score>"
}}
"#,
        role = role
    );

    EvaluationPrompt {
        role: role.to_string(),
        text,
    }
}

/// JSON skeleton appended after the CV content.
pub fn response_format_reminder() -> &'static str {
    r#"Please respond in the following JSON format:
{
  "educationalQualification": "",
  "jobHistory": "",
  "skillSet": "",
  "level": "",
  "score": 0,
  "pass": false,
  "justification": ""
}"#
}

/// Combine the prompt, one CV's text and the format reminder into a single request.
pub fn compose_request(prompt: &EvaluationPrompt, cv_text: &str) -> String {
    format!(
        "{}\n\nCV Content:\n{}\n\n{}\n",
        prompt.as_str(),
        cv_text,
        response_format_reminder()
    )
}

//! Parsing and coercion of the evaluator's answer.
//!
//! The evaluator is asked for a JSON object, but the values inside it are
//! not trusted: scores arrive as numbers or strings, summaries sometimes as
//! arrays. Everything is normalized here before the rest of the pipeline
//! reads a single field.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::validate_response_schema;
use crate::types::{EvaluationResult, Score, SeniorityLevel};

/// Fields that must be present for an answer to be accepted.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "educationalQualification",
    "jobHistory",
    "skillSet",
    "score",
    "justification",
];

lazy_static! {
    /// A whole answer wrapped in a markdown code fence, with optional language tag.
    static ref CODE_FENCE: Regex = Regex::new(
        r"(?s)^\s*```[A-Za-z]*[ \t]*\r?\n(.*?)\s*```\s*$"
    ).unwrap();
}

/// Reasons an answer is rejected. Each one fails the current attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    #[error("Failed to decode JSON response: {0}")]
    InvalidJson(String),

    #[error("Response is not a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Response failed schema validation: {0}")]
    Schema(String),
}

/// Parse, validate and coerce a raw answer into an [`EvaluationResult`].
pub fn parse_evaluation(raw: &str) -> Result<EvaluationResult, ResponseError> {
    let body = strip_code_fence(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| ResponseError::InvalidJson(e.to_string()))?;

    let object = value.as_object().ok_or(ResponseError::NotAnObject)?;

    if let Err(errors) = validate_response_schema(&value) {
        if let Some(field) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
            return Err(ResponseError::MissingField(field.to_string()));
        }
        return Err(ResponseError::Schema(errors.join("; ")));
    }

    Ok(coerce_object(object))
}

/// Remove a surrounding markdown code fence, if the whole answer is fenced.
pub fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

fn coerce_object(object: &Map<String, Value>) -> EvaluationResult {
    EvaluationResult {
        educational_qualification: coerce_text(object.get("educationalQualification")),
        job_history: coerce_text(object.get("jobHistory")),
        skill_set: coerce_text(object.get("skillSet")),
        level: coerce_level(object.get("level")),
        score: object.get("score").map(coerce_score).unwrap_or_default(),
        pass: coerce_pass(object.get("pass")),
        justification: coerce_text(object.get("justification")),
    }
}

/// Coerce a score value and clamp it into `[0, 100]`.
///
/// Strings containing a `.` parse as floats, other strings as integers.
/// Anything that is not a number or a numeric string scores zero.
pub fn coerce_score(value: &Value) -> Score {
    let score = match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Score::Integer(v)
            } else if n.is_u64() {
                Score::Integer(i64::MAX)
            } else {
                n.as_f64().map(Score::Float).unwrap_or_default()
            }
        }
        Value::String(s) => parse_score_text(s).unwrap_or_else(|| {
            tracing::warn!(score = %s, "Non-numeric score, defaulting to 0");
            Score::zero()
        }),
        other => {
            tracing::warn!(score = %other, "Unexpected score type, defaulting to 0");
            Score::zero()
        }
    };
    score.clamped()
}

fn parse_score_text(text: &str) -> Option<Score> {
    let text = text.trim();
    if text.contains('.') {
        text.parse::<f64>().ok().map(Score::Float)
    } else {
        text.parse::<i64>()
            .ok()
            .map(Score::Integer)
            .or_else(|| text.parse::<f64>().ok().map(Score::Float))
    }
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

fn coerce_level(value: Option<&Value>) -> Option<SeniorityLevel> {
    match value? {
        Value::String(s) => Some(SeniorityLevel::parse_lenient(s)),
        Value::Null => None,
        _ => Some(SeniorityLevel::Unknown),
    }
}

fn coerce_pass(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn full_answer(score: Value) -> String {
        json!({
            "educationalQualification": "BSc Software Engineering",
            "jobHistory": "Intern at a fintech startup",
            "skillSet": "TypeScript, React, PostgreSQL",
            "level": "junior",
            "score": score,
            "pass": true,
            "justification": "Relevant projects, limited production exposure"
        })
        .to_string()
    }

    #[test]
    fn test_parse_complete_answer() {
        let result = parse_evaluation(&full_answer(json!(74))).unwrap();
        assert_eq!(result.score, Score::Integer(74));
        assert_eq!(result.level, Some(SeniorityLevel::Junior));
        assert_eq!(result.pass, Some(true));
        assert_eq!(result.skill_set.as_deref(), Some("TypeScript, React, PostgreSQL"));
    }

    #[test]
    fn test_parse_fenced_answer() {
        let fenced = format!("```json\n{}\n```", full_answer(json!(60)));
        let result = parse_evaluation(&fenced).unwrap();
        assert_eq!(result.score, Score::Integer(60));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = parse_evaluation("The candidate looks great!").unwrap_err();
        assert!(matches!(err, ResponseError::InvalidJson(_)));
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(parse_evaluation("[1, 2, 3]").unwrap_err(), ResponseError::NotAnObject);
    }

    #[test]
    fn test_missing_field_rejected() {
        let answer = json!({
            "educationalQualification": "MSc",
            "jobHistory": "5 years",
            "skillSet": "Kotlin",
            "score": 80
        })
        .to_string();
        assert_eq!(
            parse_evaluation(&answer).unwrap_err(),
            ResponseError::MissingField("justification".to_string())
        );
    }

    #[test]
    fn test_optional_fields_absent() {
        let answer = json!({
            "educationalQualification": "MSc",
            "jobHistory": "5 years",
            "skillSet": "Kotlin",
            "score": 80,
            "justification": "ok"
        })
        .to_string();
        let result = parse_evaluation(&answer).unwrap();
        assert_eq!(result.level, None);
        assert_eq!(result.pass, None);
    }

    #[test]
    fn test_string_scores() {
        assert_eq!(coerce_score(&json!("85")), Score::Integer(85));
        assert_eq!(coerce_score(&json!(" 72.5 ")), Score::Float(72.5));
        assert_eq!(coerce_score(&json!("250")), Score::Integer(100));
        assert_eq!(coerce_score(&json!("-4.0")), Score::Integer(0));
        assert_eq!(coerce_score(&json!("-0.0")), Score::Integer(0));
        assert_eq!(coerce_score(&json!("excellent")), Score::Integer(0));
    }

    #[test]
    fn test_non_numeric_scores_default_to_zero() {
        assert_eq!(coerce_score(&json!(null)), Score::Integer(0));
        assert_eq!(coerce_score(&json!(true)), Score::Integer(0));
        assert_eq!(coerce_score(&json!([90])), Score::Integer(0));
        assert_eq!(coerce_score(&json!({"value": 90})), Score::Integer(0));
    }

    #[test]
    fn test_numeric_scores_keep_kind() {
        assert_eq!(coerce_score(&json!(88)), Score::Integer(88));
        assert_eq!(coerce_score(&json!(88.0)), Score::Float(88.0));
        assert_eq!(coerce_score(&json!(-12)), Score::Integer(0));
        assert_eq!(coerce_score(&json!(18446744073709551615u64)), Score::Integer(100));
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(
            coerce_text(Some(&json!(["Rust", "Tokio", 3]))),
            Some("Rust, Tokio, 3".to_string())
        );
        assert_eq!(coerce_text(Some(&json!(null))), None);
        assert_eq!(coerce_text(None), None);
        assert_eq!(coerce_text(Some(&json!(4))), Some("4".to_string()));
    }

    #[test]
    fn test_pass_coercion() {
        assert_eq!(coerce_pass(Some(&json!(false))), Some(false));
        assert_eq!(coerce_pass(Some(&json!("TRUE"))), Some(true));
        assert_eq!(coerce_pass(Some(&json!("maybe"))), None);
        assert_eq!(coerce_pass(Some(&json!(1))), None);
    }

    #[test]
    fn test_level_coercion() {
        assert_eq!(coerce_level(Some(&json!("Middle"))), Some(SeniorityLevel::Middle));
        assert_eq!(coerce_level(Some(&json!("staff"))), Some(SeniorityLevel::Unknown));
        assert_eq!(coerce_level(Some(&json!(3))), Some(SeniorityLevel::Unknown));
        assert_eq!(coerce_level(Some(&json!(null))), None);
    }

    proptest! {
        #[test]
        fn prop_integer_scores_always_in_range(v in any::<i64>()) {
            prop_assert!(coerce_score(&json!(v)).is_in_range());
        }

        #[test]
        fn prop_float_scores_always_in_range(v in -1.0e9f64..1.0e9) {
            prop_assert!(coerce_score(&json!(v)).is_in_range());
        }

        #[test]
        fn prop_string_scores_always_in_range(s in "\\PC{0,12}") {
            prop_assert!(coerce_score(&json!(s)).is_in_range());
        }
    }
}

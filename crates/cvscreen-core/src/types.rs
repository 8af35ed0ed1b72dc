//! Core data model for screening results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::writer::COLUMNS;

/// Placeholder written into every text field of a failed evaluation.
pub const ERROR_MARKER: &str = "Error processing";

/// Candidate seniority inferred by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeniorityLevel {
    Intern,
    Fresher,
    Junior,
    Middle,
    Senior,
    /// The evaluator answered with something outside the known levels
    Unknown,
    /// The evaluation itself failed
    Error,
}

impl SeniorityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeniorityLevel::Intern => "intern",
            SeniorityLevel::Fresher => "fresher",
            SeniorityLevel::Junior => "junior",
            SeniorityLevel::Middle => "middle",
            SeniorityLevel::Senior => "senior",
            SeniorityLevel::Unknown => "unknown",
            SeniorityLevel::Error => "error",
        }
    }

    /// Map evaluator text to a level. Anything unrecognized becomes `Unknown`,
    /// including `"error"`: only [`EvaluationResult::sentinel`] sets `Error`.
    pub fn parse_lenient(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "intern" => SeniorityLevel::Intern,
            "fresher" => SeniorityLevel::Fresher,
            "junior" => SeniorityLevel::Junior,
            "middle" | "mid" => SeniorityLevel::Middle,
            "senior" => SeniorityLevel::Senior,
            _ => SeniorityLevel::Unknown,
        }
    }
}

impl fmt::Display for SeniorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate score. Keeps the integer/float distinction the evaluator used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Score {
    Integer(i64),
    Float(f64),
}

impl Score {
    pub const MIN: i64 = 0;
    pub const MAX: i64 = 100;

    pub fn zero() -> Self {
        Score::Integer(0)
    }

    /// Clamp into `[0, 100]`. A float at or past a bound (including `-0.0`)
    /// becomes the integer bound; NaN collapses to zero.
    pub fn clamped(self) -> Self {
        match self {
            Score::Integer(v) => Score::Integer(v.clamp(Self::MIN, Self::MAX)),
            Score::Float(v) if v.is_nan() || v <= Self::MIN as f64 => Score::Integer(Self::MIN),
            Score::Float(v) if v >= Self::MAX as f64 => Score::Integer(Self::MAX),
            Score::Float(v) => Score::Float(v),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Score::Integer(v) => *v as f64,
            Score::Float(v) => *v,
        }
    }

    pub fn is_in_range(&self) -> bool {
        let v = self.as_f64();
        (Self::MIN as f64..=Self::MAX as f64).contains(&v)
    }

    fn to_json(self) -> Value {
        match self {
            Score::Integer(v) => Value::from(v),
            Score::Float(v) => serde_json::Number::from_f64(v)
                .map(Value::Number)
                .unwrap_or_else(|| Value::from(0)),
        }
    }
}

impl Default for Score {
    fn default() -> Self {
        Score::zero()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Integer(v) => write!(f, "{}", v),
            // Whole floats keep their decimal point ("85.0"), matching the table format.
            Score::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Score::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A validated evaluation of one CV.
///
/// Optional fields were either absent or null in the evaluator's answer; the
/// result writer renders them as empty cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationResult {
    pub educational_qualification: Option<String>,
    pub job_history: Option<String>,
    pub skill_set: Option<String>,
    pub level: Option<SeniorityLevel>,
    pub score: Score,
    pub pass: Option<bool>,
    pub justification: Option<String>,
}

impl EvaluationResult {
    /// Record used when an evaluation could not be completed.
    pub fn sentinel(justification: impl Into<String>) -> Self {
        Self {
            educational_qualification: Some(ERROR_MARKER.to_string()),
            job_history: Some(ERROR_MARKER.to_string()),
            skill_set: Some(ERROR_MARKER.to_string()),
            level: Some(SeniorityLevel::Error),
            score: Score::zero(),
            pass: Some(false),
            justification: Some(justification.into()),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.level == Some(SeniorityLevel::Error)
    }

    /// Prefix the justification with a note, keeping whatever was there.
    pub fn annotate(&mut self, note: &str) {
        let existing = self.justification.take().unwrap_or_default();
        self.justification = Some(format!("{}{}", note, existing));
    }
}

/// One row of the result table: an evaluation tagged with its source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningRecord {
    /// File name of the evaluated document
    pub output: String,
    pub result: EvaluationResult,
}

impl ScreeningRecord {
    pub fn new(output: impl Into<String>, result: EvaluationResult) -> Self {
        Self {
            output: output.into(),
            result,
        }
    }

    /// Row for a document whose processing failed outside the evaluator.
    pub fn error(output: impl Into<String>, message: &str) -> Self {
        Self::new(output, EvaluationResult::sentinel(format!("Error: {}", message)))
    }

    /// Column-keyed view of this record. Absent fields are left out of the map.
    pub fn to_row(&self) -> Map<String, Value> {
        let r = &self.result;
        let mut row = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                row.insert(key.to_string(), value);
            }
        };

        put(COLUMNS[0], Some(Value::String(self.output.clone())));
        put(COLUMNS[1], r.educational_qualification.clone().map(Value::String));
        put(COLUMNS[2], r.job_history.clone().map(Value::String));
        put(COLUMNS[3], r.skill_set.clone().map(Value::String));
        put(COLUMNS[4], r.level.map(|l| Value::String(l.as_str().to_string())));
        put(COLUMNS[5], Some(r.score.to_json()));
        put(COLUMNS[6], r.pass.map(Value::Bool));
        put(COLUMNS[7], r.justification.clone().map(Value::String));
        row
    }
}

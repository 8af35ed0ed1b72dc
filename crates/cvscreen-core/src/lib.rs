//! # cvscreen-core
//!
//! Deterministic building blocks for screening CVs against a job role.
//!
//! This crate holds everything that does not touch the network or the
//! filesystem layout of a run:
//! - Rendering the evaluation prompt for a role
//! - Parsing, validating and coercing the evaluator's JSON answer
//! - The result table format and its writer
//! - Summary statistics over a finished table
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the same role always renders the same prompt
//! 2. **Bounded scores**: every score leaving this crate is within `[0, 100]`
//! 3. **Fixed table**: the header and column order never change
//!
//! ## Example
//!
//! ```rust,ignore
//! use cvscreen_core::{build_evaluation_prompt, parse_evaluation, ResultWriter, ScreeningRecord};
//!
//! let prompt = build_evaluation_prompt("junior fullstack developer");
//! let result = parse_evaluation(&answer_text)?;
//! let records = vec![ScreeningRecord::new("alice.pdf", result)];
//! ResultWriter::new().write(&records, "results.csv".as_ref())?;
//! ```

pub mod prompt;
pub mod report;
pub mod response;
pub mod role;
pub mod schema;
pub mod types;
pub mod writer;

pub use prompt::{build_evaluation_prompt, compose_request, response_format_reminder, EvaluationPrompt};
pub use report::{ReportError, ScoreBand, SummaryReport};
pub use response::{coerce_score, parse_evaluation, strip_code_fence, ResponseError, REQUIRED_FIELDS};
pub use role::{role_from_folder, role_from_name};
pub use types::{EvaluationResult, Score, ScreeningRecord, SeniorityLevel, ERROR_MARKER};
pub use writer::{render_cell, ResultWriter, WriterError, COLUMNS};

//! Summary statistics over a result table.
//!
//! Mirrors the headline numbers a reviewer looks at first: how many CVs,
//! how many passed, average and best score, and how candidates spread over
//! levels and score bands. Rows whose score cannot be read are left out, the
//! same way the review dashboard drops them.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use crate::types::ScreeningRecord;

/// Errors while loading a result table for reporting.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read results: {0}")]
    Csv(#[from] csv::Error),

    #[error("Result table has no '{0}' column")]
    MissingColumn(&'static str),
}

/// Score bands used when summarizing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Excellent,
    Strong,
    Good,
    Fair,
    Marginal,
    Poor,
}

impl ScoreBand {
    pub const ALL: [ScoreBand; 6] = [
        ScoreBand::Excellent,
        ScoreBand::Strong,
        ScoreBand::Good,
        ScoreBand::Fair,
        ScoreBand::Marginal,
        ScoreBand::Poor,
    ];

    pub fn for_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => ScoreBand::Excellent,
            s if s >= 80.0 => ScoreBand::Strong,
            s if s >= 70.0 => ScoreBand::Good,
            s if s >= 60.0 => ScoreBand::Fair,
            s if s >= 50.0 => ScoreBand::Marginal,
            _ => ScoreBand::Poor,
        }
    }

    /// Inclusive score range of the band.
    pub fn range(&self) -> (u8, u8) {
        match self {
            ScoreBand::Excellent => (90, 100),
            ScoreBand::Strong => (80, 89),
            ScoreBand::Good => (70, 79),
            ScoreBand::Fair => (60, 69),
            ScoreBand::Marginal => (50, 59),
            ScoreBand::Poor => (0, 49),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => "excellent",
            ScoreBand::Strong => "strong",
            ScoreBand::Good => "good",
            ScoreBand::Fair => "fair",
            ScoreBand::Marginal => "marginal",
            ScoreBand::Poor => "poor",
        }
    }
}

/// One row reduced to the fields the summary needs.
struct SummaryRow {
    score: f64,
    pass: Option<bool>,
    level: Option<String>,
}

/// Headline statistics for a screening run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub total: usize,
    pub passed: usize,
    pub average_score: Option<f64>,
    pub highest_score: Option<f64>,
    /// Candidates per level; missing levels are counted as `unknown`
    pub levels: BTreeMap<String, usize>,
    pub bands: BTreeMap<ScoreBand, usize>,
}

impl SummaryReport {
    pub fn from_records(records: &[ScreeningRecord]) -> Self {
        Self::from_rows(records.iter().map(|r| SummaryRow {
            score: r.result.score.as_f64(),
            pass: r.result.pass,
            level: r.result.level.map(|l| l.as_str().to_string()),
        }))
    }

    /// Load a written result table and summarize it.
    pub fn from_csv(path: &Path) -> Result<Self, ReportError> {
        let reader = csv::Reader::from_path(path)?;
        Self::from_csv_reader(reader)
    }

    pub fn from_reader<R: Read>(input: R) -> Result<Self, ReportError> {
        Self::from_csv_reader(csv::Reader::from_reader(input))
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, ReportError> {
        let headers = reader.headers()?.clone();
        let column = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(ReportError::MissingColumn(name))
        };
        let score_idx = column("score")?;
        let pass_idx = column("pass").ok();
        let level_idx = column("level").ok();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let Some(score) = record
                .get(score_idx)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|s| s.is_finite())
            else {
                continue;
            };
            let pass = pass_idx
                .and_then(|i| record.get(i))
                .and_then(|p| match p.trim().to_ascii_lowercase().as_str() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                });
            let level = level_idx
                .and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            rows.push(SummaryRow { score, pass, level });
        }

        Ok(Self::from_rows(rows))
    }

    fn from_rows(rows: impl IntoIterator<Item = SummaryRow>) -> Self {
        let mut total = 0;
        let mut passed = 0;
        let mut score_sum = 0.0;
        let mut highest: Option<f64> = None;
        let mut levels = BTreeMap::new();
        let mut bands = BTreeMap::new();

        for row in rows {
            total += 1;
            if row.pass == Some(true) {
                passed += 1;
            }
            score_sum += row.score;
            highest = Some(highest.map_or(row.score, |h| h.max(row.score)));
            *levels
                .entry(row.level.unwrap_or_else(|| "unknown".to_string()))
                .or_insert(0) += 1;
            *bands.entry(ScoreBand::for_score(row.score)).or_insert(0) += 1;
        }

        Self {
            total,
            passed,
            average_score: (total > 0).then(|| score_sum / total as f64),
            highest_score: highest,
            levels,
            bands,
        }
    }

    pub fn pass_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.passed as f64 / self.total as f64)
    }
}

impl fmt::Display for SummaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total CVs processed: {}", self.total)?;
        writeln!(f, "Candidates passed:   {}", self.passed)?;
        match self.average_score {
            Some(avg) => writeln!(f, "Average score:       {:.1}/100", avg)?,
            None => writeln!(f, "Average score:       n/a")?,
        }
        match self.highest_score {
            Some(max) => writeln!(f, "Highest score:       {}/100", max)?,
            None => writeln!(f, "Highest score:       n/a")?,
        }

        writeln!(f, "Levels:")?;
        for (level, count) in &self.levels {
            writeln!(f, "  {:<10} {}", level, count)?;
        }

        writeln!(f, "Score bands:")?;
        for band in ScoreBand::ALL {
            let (lo, hi) = band.range();
            let count = self.bands.get(&band).copied().unwrap_or(0);
            writeln!(f, "  {:<10} {:>3}-{:<3} {}", band.label(), lo, hi, count)?;
        }
        Ok(())
    }
}

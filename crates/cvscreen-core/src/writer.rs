//! Result table writer.
//!
//! The table has a fixed column set consumed by downstream tooling:
//! `pass` must be the literal `true`/`false`, missing values must be empty
//! cells (never `null`), and rows keep input order.

use serde_json::{Map, Value};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::ScreeningRecord;

/// Column order of the result table.
pub const COLUMNS: [&str; 8] = [
    "output",
    "educationalQualification",
    "jobHistory",
    "skillSet",
    "level",
    "score",
    "pass",
    "justification",
];

/// Errors while writing the result table. Never retried.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("I/O error writing results: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error writing results: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to move results into {path}: {source}")]
    Persist { path: PathBuf, source: io::Error },
}

/// Writes screening records as CSV.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultWriter;

impl ResultWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write the table to `path`.
    ///
    /// Rows go to a temporary file next to the destination which is then
    /// renamed over it, so readers see either the old file or the full table.
    pub fn write(&self, records: &[ScreeningRecord], path: &Path) -> Result<(), WriterError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut staging = staging_file(dir, path)?;
        self.write_to(records, staging.as_file_mut())?;
        staging.as_file().sync_all()?;
        staging.persist(path).map_err(|e| WriterError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        tracing::info!(rows = records.len(), path = %path.display(), "Wrote results");
        Ok(())
    }

    /// Write typed records to any writer.
    pub fn write_to<W: Write>(&self, records: &[ScreeningRecord], out: W) -> Result<(), WriterError> {
        let rows: Vec<Map<String, Value>> = records.iter().map(ScreeningRecord::to_row).collect();
        self.write_rows(&rows, out)
    }

    /// Write loosely typed rows. Keys outside [`COLUMNS`] are ignored.
    pub fn write_rows<W: Write>(&self, rows: &[Map<String, Value>], out: W) -> Result<(), WriterError> {
        let mut csv_writer = csv::Writer::from_writer(out);
        csv_writer.write_record(COLUMNS)?;

        for row in rows {
            let cells = COLUMNS.iter().map(|column| render_cell(column, row.get(*column)));
            csv_writer.write_record(cells)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Staging file next to `path`. It gets the permissions of the file it
/// replaces, or the usual `0o666 & !umask` for a new table.
fn staging_file(dir: &Path, path: &Path) -> io::Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".cvscreen-").suffix(".csv.tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let staging = builder.tempfile_in(dir)?;

    if let Ok(existing) = std::fs::metadata(path) {
        staging.as_file().set_permissions(existing.permissions())?;
    }
    Ok(staging)
}

/// Render one cell.
///
/// Missing and null become empty. A boolean `pass` becomes `true`/`false`
/// before any other stringification; strings are written verbatim and
/// everything else uses its JSON text.
pub fn render_cell(column: &str, value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(b)) if column == "pass" => {
            if *b { "true".to_string() } else { "false".to_string() }
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

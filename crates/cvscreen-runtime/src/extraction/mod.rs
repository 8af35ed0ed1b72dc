//! Document text extraction.
//!
//! [`PdfExtractor`] turns a PDF into one normalized text blob: page order is
//! preserved, lines are trimmed, empty lines dropped and header lines (large
//! font) prefixed with `# `. Pages whose layout cannot be recovered fall back
//! to the raw text layer.
//!
//! Extraction never fails from the caller's point of view. Unreadable files,
//! malformed PDFs and panics inside the PDF libraries all come back as
//! [`ExtractionStatus::Failed`] with empty text.

mod layout;

use lopdf::Document;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use thiserror::Error;

use crate::panic_message;

/// Default size above which a line is treated as a header.
pub const DEFAULT_HEADER_FONT_SIZE: f32 = 14.0;

/// Why extraction of a document or page failed.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("unreadable content: {0}")]
    Unreadable(String),

    #[error("PDF parser panicked: {0}")]
    Panicked(String),
}

/// How the text of a document was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Every page went through layout analysis
    Structured,
    /// These pages (1-based) used the raw text layer instead
    RawFallback { pages: Vec<u32> },
    /// Nothing usable was extracted; `text` is empty
    Failed { reason: String },
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStatus::Structured => write!(f, "structured"),
            ExtractionStatus::RawFallback { pages } => write!(f, "raw fallback on pages {:?}", pages),
            ExtractionStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Text extracted from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub pages: usize,
    pub status: ExtractionStatus,
}

impl ExtractedText {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            pages: 0,
            status: ExtractionStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ExtractionStatus::Failed { .. })
    }

    /// Failure reason, if extraction failed.
    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            ExtractionStatus::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Converts a document on disk into text.
pub trait DocumentExtractor: Send + Sync {
    /// Never panics and never errors; failures are reported in the status.
    fn extract(&self, path: &Path) -> ExtractedText;
}

/// PDF extractor built on `lopdf` with a `pdf-extract` raw fallback.
#[derive(Debug, Clone, Copy)]
pub struct PdfExtractor {
    header_font_size: f32,
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_FONT_SIZE)
    }
}

impl PdfExtractor {
    pub fn new(header_font_size: f32) -> Self {
        Self { header_font_size }
    }

    pub fn header_font_size(&self) -> f32 {
        self.header_font_size
    }

    /// Extract from an in-memory PDF.
    pub fn extract_bytes(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut raw = RawText::new(bytes);

        let mut texts = Vec::with_capacity(pages.len());
        let mut fallback_pages = Vec::new();

        for (index, (&page_number, &page_id)) in pages.iter().enumerate() {
            match layout::page_text(&doc, page_id, self.header_font_size) {
                Ok(text) if !text.trim().is_empty() => {
                    texts.push(text);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(page = page_number, error = %e, "Layout analysis failed, using raw text");
                }
            }

            let text = raw.page(&doc, index, page_number);
            if !text.trim().is_empty() {
                fallback_pages.push(page_number);
                texts.push(text);
            }
        }

        let text = normalize_text(&texts.join("\n"));
        let status = if text.is_empty() {
            ExtractionStatus::Failed {
                reason: "no extractable text".to_string(),
            }
        } else if fallback_pages.is_empty() {
            ExtractionStatus::Structured
        } else {
            ExtractionStatus::RawFallback {
                pages: fallback_pages,
            }
        };

        Ok(ExtractedText {
            text,
            pages: pages.len(),
            status,
        })
    }
}

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> ExtractedText {
        let outcome = std::fs::read(path)
            .map_err(ExtractionError::from)
            .and_then(|bytes| {
                panic::catch_unwind(AssertUnwindSafe(|| self.extract_bytes(&bytes)))
                    .unwrap_or_else(|payload| Err(ExtractionError::Panicked(panic_message(&*payload))))
            });

        match outcome {
            Ok(extracted) => {
                match &extracted.status {
                    ExtractionStatus::Failed { reason } => {
                        tracing::error!(path = %path.display(), reason = %reason, "No text extracted");
                    }
                    ExtractionStatus::RawFallback { pages } => {
                        tracing::warn!(path = %path.display(), pages = ?pages, "Used raw text for some pages");
                    }
                    ExtractionStatus::Structured => {}
                }
                extracted
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Error parsing PDF");
                ExtractedText::failed(e.to_string())
            }
        }
    }
}

/// Lazily computed raw text layer, one entry per page.
struct RawText<'a> {
    bytes: &'a [u8],
    pages: Option<Vec<String>>,
}

impl<'a> RawText<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pages: None }
    }

    /// Raw text for a page: `pdf-extract` first, then `lopdf`'s own extractor.
    fn page(&mut self, doc: &Document, index: usize, page_number: u32) -> String {
        let bytes = self.bytes;
        let pages = self.pages.get_or_insert_with(|| {
            panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default()
        });

        if let Some(text) = pages.get(index).filter(|t| !t.trim().is_empty()) {
            return text.clone();
        }

        panic::catch_unwind(AssertUnwindSafe(|| doc.extract_text(&[page_number])))
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default()
    }
}

/// Drop control characters (tabs become spaces), trim every line and drop
/// the empty ones.
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.chars()
                .filter_map(|c| match c {
                    '\t' => Some(' '),
                    c if c.is_control() => None,
                    c => Some(c),
                })
                .collect::<String>()
        })
        .filter_map(|line| {
            let line = line.trim();
            (!line.is_empty()).then(|| line.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

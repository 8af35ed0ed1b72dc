//! Text layout recovered from a page content stream.
//!
//! Walks the text operators of a decoded content stream and groups the
//! shown strings into blocks (`BT`..`ET`), lines and spans. Each span keeps
//! the effective font size it was shown at, which is all the header
//! heuristic needs.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

use super::ExtractionError;

/// Share of control characters above which decoded text is considered
/// garbage (typically two-byte CID strings read as single bytes).
const MAX_CONTROL_RATIO: f32 = 0.1;

/// TJ adjustments more negative than this read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Span {
    pub text: String,
    pub size: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    fn ends_with_space(&self) -> bool {
        self.spans
            .last()
            .is_some_and(|s| s.text.ends_with(char::is_whitespace))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Block {
    pub lines: Vec<Line>,
}

impl Block {
    /// Size of the first span of the first line.
    fn lead_size(&self) -> Option<f32> {
        self.lines
            .first()
            .and_then(|l| l.spans.first())
            .map(|s| s.size)
    }
}

/// Render one page with header lines marked.
pub(crate) fn page_text(
    doc: &Document,
    page_id: ObjectId,
    header_font_size: f32,
) -> Result<String, ExtractionError> {
    let data = doc.get_page_content(page_id)?;
    let content = Content::decode(&data)?;
    let blocks = collect_blocks(&content.operations);

    if is_garbled(&blocks) {
        return Err(ExtractionError::Unreadable(
            "text uses an encoding that cannot be decoded".to_string(),
        ));
    }

    Ok(render_blocks(&blocks, header_font_size))
}

/// Emit every non-blank line; all lines of a block whose lead size is
/// above `header_font_size` become `# ` headers.
pub(crate) fn render_blocks(blocks: &[Block], header_font_size: f32) -> String {
    let mut out = String::new();
    for block in blocks {
        let is_header = block.lead_size().is_some_and(|size| size > header_font_size);
        for line in &block.lines {
            let text = line.text();
            if text.trim().is_empty() {
                continue;
            }
            if is_header {
                out.push_str("\n# ");
                out.push_str(&text);
                out.push('\n');
            } else {
                out.push_str(&text);
                out.push('\n');
            }
        }
    }
    out
}

/// Tracks text state while walking the operators.
struct Walker {
    blocks: Vec<Block>,
    block: Block,
    line: Line,
    font_size: f32,
    scale: f32,
}

impl Walker {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            block: Block::default(),
            line: Line::default(),
            font_size: 12.0,
            scale: 1.0,
        }
    }

    fn break_line(&mut self) {
        if !self.line.spans.is_empty() {
            self.block.lines.push(std::mem::take(&mut self.line));
        }
    }

    fn end_block(&mut self) {
        self.break_line();
        if !self.block.lines.is_empty() {
            self.blocks.push(std::mem::take(&mut self.block));
        }
    }

    fn show(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let size = self.font_size * self.scale;
        match self.line.spans.last_mut() {
            Some(last) if last.size == size => last.text.push_str(&text),
            _ => self.line.spans.push(Span { text, size }),
        }
    }

    fn gap(&mut self) {
        if !self.line.spans.is_empty() && !self.line.ends_with_space() {
            self.show(" ".to_string());
        }
    }

    fn apply(&mut self, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => {
                self.end_block();
                self.scale = 1.0;
            }
            "ET" => self.end_block(),
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size.abs();
                }
            }
            "Tm" => {
                if let (Some(c), Some(d)) = (
                    operands.get(2).and_then(number),
                    operands.get(3).and_then(number),
                ) {
                    let scale = (c * c + d * d).sqrt();
                    self.scale = if scale > 0.0 { scale } else { 1.0 };
                }
                self.break_line();
            }
            "Td" | "TD" => {
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if ty != 0.0 {
                    self.break_line();
                } else {
                    self.gap();
                }
            }
            "T*" => self.break_line(),
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(string_bytes) {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "'" => {
                self.break_line();
                if let Some(bytes) = operands.first().and_then(string_bytes) {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "\"" => {
                self.break_line();
                if let Some(bytes) = operands.get(2).and_then(string_bytes) {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        if let Some(bytes) = string_bytes(item) {
                            self.show(decode_pdf_string(bytes));
                        } else if number(item).is_some_and(|n| n < TJ_SPACE_THRESHOLD) {
                            self.gap();
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn collect_blocks(operations: &[Operation]) -> Vec<Block> {
    let mut walker = Walker::new();
    for op in operations {
        walker.apply(op);
    }
    walker.end_block();
    walker.blocks
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn string_bytes(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::String(bytes, _) => Some(bytes.as_slice()),
        _ => None,
    }
}

/// Decode a shown string: UTF-16BE with a byte order mark, otherwise
/// single-byte WinAnsi.
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|b| win_ansi(*b)).collect()
}

fn win_ansi(byte: u8) -> char {
    match byte {
        0x80 => '€',
        0x82 => '‚',
        0x83 => 'ƒ',
        0x84 => '„',
        0x85 => '…',
        0x86 => '†',
        0x87 => '‡',
        0x88 => 'ˆ',
        0x89 => '‰',
        0x8A => 'Š',
        0x8B => '‹',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x98 => '˜',
        0x99 => '™',
        0x9A => 'š',
        0x9B => '›',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => char::REPLACEMENT_CHARACTER,
        other => other as char,
    }
}

fn is_garbled(blocks: &[Block]) -> bool {
    let mut total = 0usize;
    let mut control = 0usize;
    for span in blocks.iter().flat_map(|b| &b.lines).flat_map(|l| &l.spans) {
        for c in span.text.chars() {
            total += 1;
            if c.is_control() && !matches!(c, '\t' | '\n' | '\r') {
                control += 1;
            }
        }
    }
    total > 0 && control as f32 / total as f32 > MAX_CONTROL_RATIO
}

//! Text extraction: turn a scratch file into plain text.
//!
//! The decoder is picked from the lower-cased file extension. Both decoders
//! are pure Rust and CPU-bound, so they run under `spawn_blocking`; a panic
//! inside a decoder (malformed input can trigger one) is caught there and
//! reported as [`GradeError::ExtractionFailed`] instead of tearing down the
//! worker.
//!
//! The minimum-length check is the orchestrator's job, not this module's.

use crate::error::GradeError;
use docx_rs::{
    DocumentChild, InsertChild, MoveToChild, Paragraph, ParagraphChild, Run, RunChild,
    StructuredDataTag, StructuredDataTagChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Detect the kind from a filename's extension (case-insensitive).
    pub fn from_filename(name: &str) -> Result<Self, GradeError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            _ => Err(GradeError::UnsupportedFileType { extension }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read the file at `path` and extract its text with the decoder for `kind`.
pub async fn extract_text(path: &Path, kind: DocumentKind) -> Result<String, GradeError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| GradeError::Scratch {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Extracting {} text from {} bytes", kind, bytes.len());

    let joined = tokio::task::spawn_blocking(move || match kind {
        DocumentKind::Pdf => extract_pdf(&bytes),
        DocumentKind::Docx => extract_docx(&bytes),
    })
    .await;

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(GradeError::ExtractionFailed {
            kind: kind.as_str(),
            detail: "decoder panicked on malformed input".into(),
        }),
        Err(e) => Err(GradeError::Internal(format!("Extraction task failed: {e}"))),
    }
}

// ── PDF ──────────────────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Decode PDF bytes and return the page text with whitespace normalised.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, GradeError> {
    let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        GradeError::ExtractionFailed {
            kind: "pdf",
            detail: e.to_string(),
        }
    })?;
    Ok(normalize_whitespace(&raw))
}

// ── DOCX ─────────────────────────────────────────────────────────────────

/// Decode an Office Open XML document and return its raw text.
///
/// Paragraphs are separated by newlines, table cells by tabs. Text inside
/// hyperlinks, tracked insertions and content controls is kept; deleted
/// revisions, formatting and images are dropped. Body elements whose text
/// cannot be read (tables of contents) are counted and logged, never fatal.
pub fn extract_docx(bytes: &[u8]) -> Result<String, GradeError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| GradeError::ExtractionFailed {
        kind: "docx",
        detail: e.to_string(),
    })?;

    let mut text = DocxText::default();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(para) => text.paragraph(para),
            DocumentChild::Table(table) => text.table(table),
            DocumentChild::StructuredDataTag(sdt) => text.content_control(sdt),
            DocumentChild::BookmarkStart(_)
            | DocumentChild::BookmarkEnd(_)
            | DocumentChild::CommentStart(_)
            | DocumentChild::CommentEnd(_) => {}
            DocumentChild::TableOfContents(_) | DocumentChild::Section(_) => text.skipped += 1,
        }
    }

    if text.skipped > 0 {
        warn!("DOCX decoder skipped {} unreadable elements", text.skipped);
    }

    Ok(text.lines.join("\n"))
}

/// Block-level text collected while walking a document body.
#[derive(Default)]
struct DocxText {
    lines: Vec<String>,
    skipped: usize,
}

impl DocxText {
    fn paragraph(&mut self, para: &Paragraph) {
        let mut line = String::new();
        push_inline(&para.children, &mut line);
        self.lines.push(line);
    }

    // Row and cell enums have a single variant today.
    #[allow(irrefutable_let_patterns)]
    fn table(&mut self, table: &Table) {
        for child in &table.rows {
            if let TableChild::TableRow(row) = child {
                let mut cells = Vec::new();
                for cell in &row.cells {
                    if let TableRowChild::TableCell(cell) = cell {
                        cells.push(self.cell(&cell.children));
                    }
                }
                self.lines.push(cells.join("\t"));
            }
        }
    }

    fn cell(&mut self, contents: &[TableCellContent]) -> String {
        let mut nested = DocxText::default();
        for content in contents {
            match content {
                TableCellContent::Paragraph(p) => nested.paragraph(p),
                TableCellContent::Table(t) => nested.table(t),
                TableCellContent::StructuredDataTag(sdt) => nested.content_control(sdt),
                TableCellContent::TableOfContents(_) => nested.skipped += 1,
            }
        }
        self.skipped += nested.skipped;
        nested.lines.join(" ")
    }

    /// A block-level content control: runs directly inside it form one
    /// line, nested paragraphs and tables keep their own lines.
    fn content_control(&mut self, sdt: &StructuredDataTag) {
        let mut loose = String::new();
        for child in &sdt.children {
            match child {
                StructuredDataTagChild::Run(run) => push_run(run, &mut loose),
                StructuredDataTagChild::Paragraph(p) => {
                    self.flush(&mut loose);
                    self.paragraph(p);
                }
                StructuredDataTagChild::Table(t) => {
                    self.flush(&mut loose);
                    self.table(t);
                }
                StructuredDataTagChild::StructuredDataTag(inner) => {
                    self.flush(&mut loose);
                    self.content_control(inner);
                }
                _ => {}
            }
        }
        self.flush(&mut loose);
    }

    fn flush(&mut self, loose: &mut String) {
        if !loose.is_empty() {
            self.lines.push(std::mem::take(loose));
        }
    }
}

/// Append the visible text of paragraph-level children to `out`.
fn push_inline(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(run, out),
            ParagraphChild::Hyperlink(link) => push_inline(&link.children, out),
            ParagraphChild::Insert(insert) => {
                for c in &insert.children {
                    if let InsertChild::Run(run) = c {
                        push_run(run, out);
                    }
                }
            }
            ParagraphChild::MoveTo(moved) => {
                for c in &moved.children {
                    if let MoveToChild::Run(run) = c {
                        push_run(run, out);
                    }
                }
            }
            ParagraphChild::StructuredDataTag(sdt) => {
                let mut inner = DocxText::default();
                inner.content_control(sdt);
                out.push_str(&inner.lines.join("\n"));
            }
            // Deleted and moved-away revisions, bookmarks, comments, fields.
            _ => {}
        }
    }
}

fn push_run(run: &Run, out: &mut String) {
    for rc in &run.children {
        match rc {
            RunChild::Text(t) => out.push_str(&t.text),
            RunChild::Tab(_) | RunChild::PTab(_) => out.push('\t'),
            RunChild::Break(_) | RunChild::CarriageReturn(_) => out.push('\n'),
            _ => {}
        }
    }
}

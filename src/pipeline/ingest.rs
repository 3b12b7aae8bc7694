//! Document ingestion: extract and normalise plain text from an upload.
//!
//! The caller supplies raw bytes plus the declared MIME type; nothing here
//! sniffs content beyond what a format's own container requires. The size
//! gate runs before any parsing so a 200 MB upload is rejected without
//! being touched, and every extracted text passes through [`clean_text`],
//! an idempotent sequence of pure normalisation passes.

use crate::error::CourseGenError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::{debug, warn};

/// Upload size cap, checked before parsing.
pub const MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;

/// Minimum cleaned-text length for generation to proceed. Exactly this many
/// characters is accepted.
pub const MIN_TEXT_CHARS: usize = 50;

/// The closed set of accepted document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    LegacyDoc,
    Pptx,
    PlainText,
}

impl DocumentFormat {
    /// Map a declared MIME type onto a format, or None if outside the set.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "application/pdf" => Some(DocumentFormat::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(DocumentFormat::Docx)
            }
            "application/msword" => Some(DocumentFormat::LegacyDoc),
            "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                Some(DocumentFormat::Pptx)
            }
            "text/plain" | "text/markdown" => Some(DocumentFormat::PlainText),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::LegacyDoc => "DOC",
            DocumentFormat::Pptx => "PPTX",
            DocumentFormat::PlainText => "plain text",
        }
    }
}

/// What ingestion knows about the document besides its text.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub format: DocumentFormat,
    pub byte_size: usize,
    /// Character count of the cleaned text.
    pub char_count: usize,
    /// Whitespace-separated word count of the cleaned text.
    pub word_count: usize,
}

/// Extracted, cleaned document text plus metadata.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Extract and normalise text from uploaded document bytes.
///
/// # Errors
/// - [`CourseGenError::UnsupportedFormat`] — mime outside the allowed set
/// - [`CourseGenError::DocumentTooLarge`] — over 20 MB, checked first
/// - [`CourseGenError::ParseFailure`] — the extractor produced nothing usable
///
/// The minimum-content gate is the pipeline driver's job (it owns the
/// `InsufficientContent` report); this function returns whatever text the
/// document yields.
pub fn parse_document(bytes: &[u8], mime: &str) -> Result<IngestedDocument, CourseGenError> {
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(CourseGenError::DocumentTooLarge {
            size: bytes.len(),
            max: MAX_DOCUMENT_BYTES,
        });
    }

    let format = DocumentFormat::from_mime(mime).ok_or_else(|| {
        CourseGenError::UnsupportedFormat {
            mime: mime.to_string(),
        }
    })?;

    let raw = match format {
        DocumentFormat::Pdf => extract_pdf(bytes)?,
        DocumentFormat::Docx => extract_docx(bytes)?,
        DocumentFormat::Pptx => extract_pptx(bytes)?,
        DocumentFormat::LegacyDoc => extract_legacy_doc(bytes)?,
        DocumentFormat::PlainText => String::from_utf8_lossy(bytes).into_owned(),
    };

    let text = clean_text(&raw);
    debug!(
        format = format.as_str(),
        bytes = bytes.len(),
        chars = text.chars().count(),
        "document ingested"
    );

    let char_count = text.chars().count();
    let word_count = text.split_whitespace().count();
    Ok(IngestedDocument {
        text,
        metadata: DocumentMetadata {
            format,
            byte_size: bytes.len(),
            char_count,
            word_count,
        },
    })
}

/// Check the minimum-content gate on an ingested document.
pub fn ensure_sufficient(text: &str) -> Result<(), CourseGenError> {
    let len = text.chars().count();
    if len < MIN_TEXT_CHARS {
        return Err(CourseGenError::InsufficientContent {
            len,
            min: MIN_TEXT_CHARS,
        });
    }
    Ok(())
}

// ── Cleaning ─────────────────────────────────────────────────────────────

static RE_HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Normalise extracted text: line endings, control and invisible characters,
/// whitespace runs, blank-line runs.
///
/// Idempotent — `clean_text(clean_text(x)) == clean_text(x)` — so callers
/// can re-clean defensively without losing characters. Each pass is a pure
/// `&str → String` function applied in a fixed order:
///
/// 1. Normalise line endings (CRLF/CR → LF)
/// 2. Strip control characters other than newline and tab
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Collapse runs of spaces/tabs to one space, trim line ends
/// 5. Collapse 3+ consecutive newlines to exactly 2
/// 6. Trim leading/trailing whitespace
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_control_chars(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_horizontal_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn strip_control_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

fn collapse_horizontal_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| RE_HORIZONTAL_WS.replace_all(line, " ").trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Extractors ───────────────────────────────────────────────────────────

fn parse_failure(format: DocumentFormat, detail: impl Into<String>) -> CourseGenError {
    CourseGenError::ParseFailure {
        format: format.as_str().to_string(),
        detail: detail.into(),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, CourseGenError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| parse_failure(DocumentFormat::Pdf, e.to_string()))
}

/// Pull a named entry out of an OOXML (zip) container as a string.
fn read_zip_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    format: DocumentFormat,
) -> Result<String, CourseGenError> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| parse_failure(format, format!("missing {name}: {e}")))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| parse_failure(format, format!("unreadable {name}: {e}")))?;
    Ok(xml)
}

/// Collect the character data of every `<prefix:t>` text run in an OOXML
/// part, inserting newlines at paragraph ends.
///
/// Works for both WordprocessingML (`w:t`/`w:p`) and DrawingML (`a:t`/`a:p`)
/// because only the local names are matched.
fn ooxml_text_runs(xml: &str, format: DocumentFormat) -> Result<String, CourseGenError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = e.local_name();
                if local.as_ref() == b"t" {
                    in_text_run = true;
                } else if local.as_ref() == b"br" || local.as_ref() == b"tab" {
                    out.push(' ');
                }
            }
            Ok(Event::Empty(e)) => {
                let local = e.local_name();
                if local.as_ref() == b"br" || local.as_ref() == b"tab" {
                    out.push(' ');
                }
            }
            Ok(Event::End(e)) => {
                let local = e.local_name();
                if local.as_ref() == b"t" {
                    in_text_run = false;
                } else if local.as_ref() == b"p" {
                    out.push('\n');
                }
            }
            Ok(Event::Text(t)) if in_text_run => {
                let text = t
                    .unescape()
                    .map_err(|e| parse_failure(format, format!("bad XML text: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(parse_failure(format, format!("XML parse error: {e}"))),
        }
    }

    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, CourseGenError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| parse_failure(DocumentFormat::Docx, format!("not a DOCX container: {e}")))?;
    let xml = read_zip_entry(&mut archive, "word/document.xml", DocumentFormat::Docx)?;
    ooxml_text_runs(&xml, DocumentFormat::Docx)
}

fn extract_pptx(bytes: &[u8]) -> Result<String, CourseGenError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| parse_failure(DocumentFormat::Pptx, format!("not a PPTX container: {e}")))?;

    // Slide entries are not stored in order inside the archive; sort by the
    // numeric part of ppt/slides/slideN.xml so deck order is preserved.
    let mut slide_names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .collect();
    slide_names.sort_by_key(|n| slide_number(n));

    if slide_names.is_empty() {
        return Err(parse_failure(DocumentFormat::Pptx, "no slides found"));
    }

    let mut out = String::new();
    for name in slide_names {
        let xml = read_zip_entry(&mut archive, &name, DocumentFormat::Pptx)?;
        out.push_str(&ooxml_text_runs(&xml, DocumentFormat::Pptx)?);
        out.push('\n');
    }
    Ok(out)
}

fn slide_number(name: &str) -> usize {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(usize::MAX)
}

/// Best-effort text salvage from a legacy binary `.doc`.
///
/// The format predates OOXML and has no maintained pure-Rust parser; most
/// of its text payload is stored as runs of printable bytes, so runs of
/// printable ASCII of a reasonable length recover the prose while skipping
/// the binary scaffolding. Anything below a usable yield is a parse
/// failure, never a silent empty success.
fn extract_legacy_doc(bytes: &[u8]) -> Result<String, CourseGenError> {
    const MIN_RUN: usize = 24;

    let mut out = String::new();
    let mut run = String::new();
    for &b in bytes {
        let c = b as char;
        if c.is_ascii_graphic() || c == ' ' {
            run.push(c);
        } else {
            if run.trim().len() >= MIN_RUN {
                out.push_str(run.trim());
                out.push('\n');
            }
            run.clear();
        }
    }
    if run.trim().len() >= MIN_RUN {
        out.push_str(run.trim());
        out.push('\n');
    }

    if out.trim().is_empty() {
        warn!("legacy .doc yielded no salvageable text runs");
        return Err(parse_failure(
            DocumentFormat::LegacyDoc,
            "no readable text found; convert the file to DOCX and re-upload",
        ));
    }
    Ok(out)
}

// ── Tests ────────────────────────────────────────────────────────────────

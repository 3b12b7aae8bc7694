//! Error types for the courseforge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`CourseGenError`] — **Fatal**: the generation request cannot proceed at
//!   all (unsupported upload, provider not configured, outline unusable,
//!   every section failed). Returned as `Err(CourseGenError)` from the
//!   top-level `generate*` functions.
//!
//! * [`SectionError`] — **Non-fatal**: a single section slot failed (model
//!   error, malformed response, timeout) but the other sections are fine.
//!   Stored inside [`crate::output::SectionResult`] so callers can inspect
//!   partial success rather than losing the whole course to one bad section.
//!
//! The separation lets callers decide their own tolerance: abort when any
//! section fails, show a degraded course with a failure count, or collect
//! all slot errors for a post-run report.

use thiserror::Error;

/// All fatal errors returned by the courseforge library.
///
/// Section-level failures use [`SectionError`] and are stored in
/// [`crate::output::SectionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum CourseGenError {
    // ── Ingestion errors ──────────────────────────────────────────────────
    /// The declared MIME type is outside the allowed document set.
    #[error("Unsupported document type '{mime}'\nAccepted: PDF, DOCX, DOC, PPTX, plain text.")]
    UnsupportedFormat { mime: String },

    /// Upload exceeds the size cap, checked before any parsing happens.
    #[error("Document is {size} bytes; the limit is {max} bytes (20 MB)")]
    DocumentTooLarge { size: usize, max: usize },

    /// The extractor could not produce text from the document bytes.
    #[error("Failed to extract text from {format} document: {detail}")]
    ParseFailure { format: String, detail: String },

    /// Cleaned text is too short to generate a meaningful course from.
    #[error("Document contains only {len} characters of usable text (minimum {min})\nUpload a document with more content.")]
    InsufficientContent { len: usize, min: usize },

    // ── Image search errors ───────────────────────────────────────────────
    /// The search query was empty or whitespace-only.
    #[error("Image search query must not be empty")]
    InvalidQuery,

    /// The image provider could not be reached or rejected the request.
    #[error("Image provider unavailable: {detail}")]
    ProviderUnavailable { detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No model provider could be resolved (missing API key etc.).
    #[error("Model provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API failed on transport, auth, or quota.
    #[error("Model provider '{provider}' unavailable: {detail}")]
    ModelUnavailable { provider: String, detail: String },

    /// The model's response could not be decoded into the requested shape,
    /// even after the single reformulated retry.
    #[error("Model returned output that does not match the requested structure: {detail}")]
    MalformedModelOutput { detail: String },

    /// The model produced an outline with zero usable sections.
    #[error("Model produced an empty outline; cannot generate a course without sections")]
    EmptyOutline,

    /// Every section slot failed; no partial course can be returned.
    #[error("All {attempted} sections failed during generation.\nFirst error: {first_error}")]
    GenerationFailed {
        attempted: usize,
        failed: usize,
        first_error: String,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Persistence (gateway pass-through) ────────────────────────────────
    /// Error surfaced by the persistence gateway, passed through unchanged.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// A non-fatal error for a single section slot.
///
/// Stored alongside [`crate::output::SectionResult`] when a slot fails.
/// The overall generation continues unless ALL slots fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SectionError {
    /// The model call failed on transport, auth, or quota.
    #[error("Section {index}: model call failed: {detail}")]
    ModelFailed { index: usize, detail: String },

    /// The response could not be decoded, even after the reformulated retry.
    #[error("Section {index}: model output did not match the section structure: {detail}")]
    Malformed { index: usize, detail: String },

    /// The whole section call exceeded its time budget.
    #[error("Section {index}: generation timed out after {secs}s")]
    Timeout { index: usize, secs: u64 },

    /// The model responded, but zero activities passed validation.
    #[error("Section {index}: no activities passed validation")]
    EmptySection { index: usize },
}

impl SectionError {
    /// Outline position of the failed slot (0-indexed).
    pub fn index(&self) -> usize {
        match self {
            SectionError::ModelFailed { index, .. }
            | SectionError::Malformed { index, .. }
            | SectionError::Timeout { index, .. }
            | SectionError::EmptySection { index } => *index,
        }
    }
}

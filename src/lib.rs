//! # courseforge
//!
//! Generate structured, activity-based courses from uploaded documents
//! using large language models.
//!
//! ## Why this crate?
//!
//! Turning a lecture script or a slide deck into an interactive course by
//! hand means re-typing content into questions, flashcards, and prose
//! blocks. This crate automates the pipeline: it extracts the text, asks a
//! model to plan an outline, generates every section's activities
//! concurrently, validates each activity against its kind's contract, and
//! assembles a course that degrades gracefully when individual sections
//! fail.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (bytes + mime)
//!  │
//!  ├─ 1. Ingest    extract text (PDF / DOCX / DOC / PPTX / plain), clean it
//!  ├─ 2. Outline   one model call → course title + ordered section stubs
//!  ├─ 3. Sections  one model call per stub, concurrent, 60 s budget each
//!  ├─ 4. Validate  strict JSON decode; invalid activities dropped + counted
//!  └─ 5. Assemble  outline-ordered course + per-slot results + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courseforge::{generate_course, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY
//!     let bytes = std::fs::read("lecture-notes.pdf")?;
//!     let config = GenerationConfig::default();
//!     let output = generate_course(&bytes, "application/pdf", &config).await?;
//!     println!("{} — {} sections", output.course.title, output.course.sections.len());
//!     eprintln!(
//!         "tokens: {} in / {} out, {} sections failed",
//!         output.stats.total_input_tokens,
//!         output.stats.total_output_tokens,
//!         output.stats.failed_sections,
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `coursegen` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! courseforge = { version = "0.4", default-features = false }
//! ```
//!
//! ## Partial failure
//!
//! Section generation degrades instead of aborting: if 2 of 6 sections fail
//! (model error, malformed output, timeout, or zero valid activities), the
//! returned course has the 4 good sections in outline order and
//! `stats.failed_sections == 2`. Only the loss of every section is an error
//! ([`CourseGenError::GenerationFailed`]).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod course;
pub mod error;
pub mod generate;
pub mod images;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder};
pub use course::{
    Activity, ActivityInvalid, AnswerOption, AnswerShape, ClarifyingAnswer, ClarifyingQuestion,
    CourseContent, CourseOutline, CourseSection, SectionOutline,
};
pub use error::{CourseGenError, SectionError};
pub use generate::{generate_course, generate_from_text};
pub use images::{ImageClient, ImageHit};
pub use output::{GenerationOutput, GenerationStats, Phase, SectionResult};
pub use pipeline::ingest::{
    clean_text, parse_document, DocumentFormat, DocumentMetadata, IngestedDocument,
    MAX_DOCUMENT_BYTES, MIN_TEXT_CHARS,
};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{
    AnthropicProvider, ModelError, ModelProvider, ModelRequest, ModelResponse, OpenAiProvider,
};
pub use store::{load_course, save_course, CourseStore, MemoryStore, StoreError};
pub use stream::{generate_stream, SectionStream, StreamingGeneration};

//! Streaming generation API: emit sections as they complete.
//!
//! ## Why stream?
//!
//! A full course takes many model calls. A stream-based API lets the course
//! editor show the outline immediately and fill sections in as each slot
//! resolves, instead of staring at a spinner until the slowest call
//! finishes. Unlike the eager [`crate::generate::generate_course`] which
//! returns only after assembly, [`generate_stream`] yields each
//! [`SectionResult`] the moment it settles.
//!
//! Sections arrive in **completion order**, not outline order — sort by
//! `result.index` (or slot them into a pre-sized list) if order matters.
//! Dropping the stream abandons all in-flight section calls.

use crate::config::GenerationConfig;
use crate::course::CourseOutline;
use crate::error::CourseGenError;
use crate::output::{Phase, SectionResult};
use crate::pipeline::section::SectionContext;
use crate::pipeline::{ingest, outline, section};
use crate::provider::resolve_provider;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of section slot results.
pub type SectionStream = Pin<Box<dyn Stream<Item = SectionResult> + Send>>;

/// A generation in progress: the outline is ready, the sections are still
/// arriving.
pub struct StreamingGeneration {
    /// The outline all sections are being generated from, available
    /// immediately.
    pub outline: CourseOutline,
    /// Slot results in completion order. Failures are items too — every
    /// outline entry yields exactly one result.
    pub sections: SectionStream,
}

/// Generate a course from source text, streaming sections as they are
/// ready.
///
/// The ingest and outline phases run eagerly (sections cannot start without
/// an outline); the returned [`StreamingGeneration`] then yields one
/// [`SectionResult`] per outline entry as the concurrent slot calls settle.
///
/// # Errors
/// Fatal errors only — everything up to and including the outline:
/// insufficient text, provider not configured, outline unusable. Per-slot
/// failures ride inside the streamed results.
pub async fn generate_stream(
    source_text: &str,
    config: &GenerationConfig,
) -> Result<StreamingGeneration, CourseGenError> {
    info!("starting streaming generation");

    // ── Ingest ───────────────────────────────────────────────────────────
    fire_phase(config, Phase::Ingesting);
    let text = ingest::clean_text(source_text);
    ingest::ensure_sufficient(&text)?;

    // ── Provider ─────────────────────────────────────────────────────────
    let provider = resolve_provider(config)?;

    // ── Outline ──────────────────────────────────────────────────────────
    fire_phase(config, Phase::GeneratingOutline);
    let outcome = outline::generate_outline(&provider, &text, config).await?;
    let course_outline = outcome.outline;
    let total_sections = course_outline.sections.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(total_sections);
    }
    fire_phase(config, Phase::GeneratingSections);

    // ── Build the stream ─────────────────────────────────────────────────
    let ctx = SectionContext {
        source_text: Arc::from(text.as_str()),
        outline_titles: Arc::new(
            course_outline
                .sections
                .iter()
                .map(|s| s.title.clone())
                .collect(),
        ),
        clarifications: Arc::new(config.clarifications.clone()),
    };
    let entries: Vec<_> = course_outline.sections.iter().cloned().enumerate().collect();
    let concurrency = config.concurrency;
    let config = config.clone();

    let s = stream::iter(entries.into_iter().map(move |(index, entry)| {
        let provider = Arc::clone(&provider);
        let ctx = ctx.clone();
        let config = config.clone();
        async move {
            let section_num = index + 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_section_start(section_num, total_sections);
            }
            let result = section::generate_section(provider, index, entry, ctx, &config).await;
            if let Some(ref cb) = config.progress_callback {
                match &result.error {
                    None => cb.on_section_complete(
                        section_num,
                        total_sections,
                        result.section.as_ref().map_or(0, |s| s.activities.len()),
                    ),
                    Some(e) => cb.on_section_error(section_num, total_sections, &e.to_string()),
                }
            }
            result
        }
    }))
    .buffer_unordered(concurrency);

    Ok(StreamingGeneration {
        outline: course_outline,
        sections: Box::pin(s),
    })
}

fn fire_phase(config: &GenerationConfig, phase: Phase) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_phase(phase);
    }
}

//! Eager (full-course) generation entry points.
//!
//! This module provides the simpler API: wait for every section, then
//! return the assembled course. Use [`crate::stream::generate_stream`]
//! instead when the caller wants sections progressively — the course editor
//! renders each section the moment its slot resolves.
//!
//! One request moves through the phases strictly in order: ingest, outline,
//! concurrent section fan-out, assembly. The outline must complete before
//! any section call because sections need outline entries; the section
//! calls are independent and run under a concurrency bound; the assembler
//! awaits all of them (each individually time-boxed) before producing the
//! course. Cancelling the returned future abandons all in-flight section
//! calls — nothing partial escapes.

use crate::config::GenerationConfig;
use crate::error::CourseGenError;
use crate::output::{GenerationOutput, GenerationStats, Phase, SectionResult};
use crate::pipeline::section::SectionContext;
use crate::pipeline::{assemble, ingest, outline, section};
use crate::provider::{resolve_provider, ModelProvider};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Generate a course from an uploaded document.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `bytes`  — Raw document bytes as uploaded
/// * `mime`   — The upload's declared MIME type (no sniffing happens here)
/// * `config` — Generation configuration
///
/// # Returns
/// `Ok(GenerationOutput)` on success, even if some sections failed
/// (check `output.stats.failed_sections`).
///
/// # Errors
/// Returns `Err(CourseGenError)` only for fatal errors:
/// - Unsupported/oversized/unparseable document, or too little text
/// - No model provider configured
/// - Unusable outline (transport failure, malformed after retry, empty)
/// - Every section slot failed
pub async fn generate_course(
    bytes: &[u8],
    mime: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, CourseGenError> {
    let total_start = Instant::now();
    info!(mime, bytes = bytes.len(), "starting course generation");

    // ── Step 1: Ingest document ──────────────────────────────────────────
    fire_phase(config, Phase::Ingesting);
    let ingest_start = Instant::now();
    let document = ingest::parse_document(bytes, mime)?;
    ingest::ensure_sufficient(&document.text)?;
    let ingest_duration_ms = ingest_start.elapsed().as_millis() as u64;
    info!(
        chars = document.metadata.char_count,
        words = document.metadata.word_count,
        "ingest complete"
    );

    generate_from_cleaned(document.text, config, total_start, ingest_duration_ms).await
}

/// Generate a course from text the caller already has (e.g. pasted into the
/// editor instead of uploaded). The text is cleaned and gated exactly like
/// extracted document text.
pub async fn generate_from_text(
    source_text: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, CourseGenError> {
    let total_start = Instant::now();

    fire_phase(config, Phase::Ingesting);
    let ingest_start = Instant::now();
    let text = ingest::clean_text(source_text);
    ingest::ensure_sufficient(&text)?;
    let ingest_duration_ms = ingest_start.elapsed().as_millis() as u64;

    generate_from_cleaned(text, config, total_start, ingest_duration_ms).await
}

/// The shared pipeline from cleaned text onward.
async fn generate_from_cleaned(
    text: String,
    config: &GenerationConfig,
    total_start: Instant,
    ingest_duration_ms: u64,
) -> Result<GenerationOutput, CourseGenError> {
    // ── Step 2: Resolve provider ─────────────────────────────────────────
    let provider = resolve_provider(config)?;

    // ── Step 3: Generate outline ─────────────────────────────────────────
    fire_phase(config, Phase::GeneratingOutline);
    let outline_start = Instant::now();
    let outline_outcome = outline::generate_outline(&provider, &text, config).await?;
    let outline_duration_ms = outline_start.elapsed().as_millis() as u64;
    let course_outline = outline_outcome.outline.clone();
    let total_sections = course_outline.sections.len();
    info!(sections = total_sections, "outline ready");

    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(total_sections);
    }

    // ── Step 4: Generate sections concurrently ───────────────────────────
    fire_phase(config, Phase::GeneratingSections);
    let sections_start = Instant::now();
    let mut results =
        run_section_fanout(Arc::clone(&provider), &text, &course_outline, config).await;
    let sections_duration_ms = sections_start.elapsed().as_millis() as u64;

    // Sort by outline position for assembly; completion order is irrelevant.
    results.sort_by_key(|r| r.index);

    // ── Step 5: Assemble ─────────────────────────────────────────────────
    fire_phase(config, Phase::Assembling);
    let assembled = assemble::assemble(&course_outline, &results)?;

    // ── Step 6: Compute stats ────────────────────────────────────────────
    let generated_sections = results.iter().filter(|r| r.is_ok()).count();
    let stats = GenerationStats {
        total_sections,
        generated_sections,
        failed_sections: assembled.failed_sections,
        dropped_activities: assembled.dropped_activities,
        total_input_tokens: outline_outcome.input_tokens
            + results.iter().map(|r| u64::from(r.input_tokens)).sum::<u64>(),
        total_output_tokens: outline_outcome.output_tokens
            + results.iter().map(|r| u64::from(r.output_tokens)).sum::<u64>(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ingest_duration_ms,
        outline_duration_ms,
        sections_duration_ms,
    };

    info!(
        generated = generated_sections,
        failed = stats.failed_sections,
        duration_ms = stats.total_duration_ms,
        "generation complete"
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(total_sections, generated_sections);
    }

    Ok(GenerationOutput {
        course: assembled.course,
        outline: course_outline,
        sections: results,
        stats,
    })
}

/// Dispatch one section call per outline entry, bounded by the configured
/// concurrency, and collect all slot results (order unspecified here — the
/// caller sorts by index).
pub(crate) async fn run_section_fanout(
    provider: Arc<dyn ModelProvider>,
    text: &str,
    course_outline: &crate::course::CourseOutline,
    config: &GenerationConfig,
) -> Vec<SectionResult> {
    let ctx = SectionContext {
        source_text: Arc::from(text),
        outline_titles: Arc::new(
            course_outline
                .sections
                .iter()
                .map(|s| s.title.clone())
                .collect(),
        ),
        clarifications: Arc::new(config.clarifications.clone()),
    };
    let total_sections = course_outline.sections.len();

    stream::iter(course_outline.sections.iter().cloned().enumerate().map(
        |(index, entry)| {
            let provider = Arc::clone(&provider);
            let ctx = ctx.clone();
            let config = config.clone();
            async move {
                let section_num = index + 1;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_section_start(section_num, total_sections);
                }
                let result =
                    section::generate_section(provider, index, entry, ctx, &config).await;
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
        },
    ))
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

fn fire_phase(config: &GenerationConfig, phase: Phase) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_phase(phase);
    }
}

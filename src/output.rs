//! Result types returned by the generation pipeline.
//!
//! [`SectionResult`] is the per-slot record: one per outline entry, carrying
//! either the generated section or the slot's [`SectionError`], plus token
//! and timing accounting either way. [`GenerationOutput`] bundles the
//! assembled course with all slot records and aggregate [`GenerationStats`]
//! so callers can report exactly what happened.

use crate::course::{CourseContent, CourseOutline, CourseSection};
use crate::error::SectionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of generating one section slot.
///
/// Always produced, success or failure — a failed slot still records which
/// outline entry it was, how long it took, and what went wrong.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResult {
    /// Position in the outline (0-indexed). Assembly order is keyed on this,
    /// never on completion order.
    pub index: usize,
    /// Outline title of the slot, kept for reporting even when it failed.
    pub title: String,
    /// The generated section, when the slot succeeded.
    pub section: Option<CourseSection>,
    /// Activities the model produced that failed their kind contract and
    /// were dropped before assembly.
    pub dropped_activities: usize,
    /// Prompt tokens consumed (summed over the retry, if one happened).
    pub input_tokens: u32,
    /// Completion tokens consumed.
    pub output_tokens: u32,
    /// Wall-clock duration of the slot call.
    pub duration_ms: u64,
    /// Whether the single malformed-output retry fired.
    pub retried: bool,
    /// The slot's error, when it failed.
    pub error: Option<SectionError>,
}

impl SectionResult {
    /// True when the slot produced a usable section.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.section.is_some()
    }
}

/// Aggregate accounting for one generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Sections the outline asked for.
    pub total_sections: usize,
    /// Sections that generated and validated successfully.
    pub generated_sections: usize,
    /// Sections whose slot failed (model error, malformed, timeout, empty).
    pub failed_sections: usize,
    /// Activities dropped across all sections for failing validation.
    pub dropped_activities: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub ingest_duration_ms: u64,
    pub outline_duration_ms: u64,
    pub sections_duration_ms: u64,
}

/// Everything a generation request produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// The assembled course (successful sections only, in outline order).
    pub course: CourseContent,
    /// The outline the sections were generated from, including any
    /// clarifying questions the model raised.
    pub outline: CourseOutline,
    /// Per-slot records in outline order, failures included.
    pub sections: Vec<SectionResult>,
    pub stats: GenerationStats,
}

/// Pipeline phase, reported through the progress callback as the request
/// advances. One request moves strictly forward through these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ingesting,
    GeneratingOutline,
    GeneratingSections,
    Assembling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Ingesting => "ingesting",
            Phase::GeneratingOutline => "generating outline",
            Phase::GeneratingSections => "generating sections",
            Phase::Assembling => "assembling",
        };
        f.write_str(s)
    }
}

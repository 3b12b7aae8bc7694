//! Assembly: merge section slot results into one ordered course.
//!
//! Results are keyed by outline position, never by arrival time, so the
//! course reads in outline order no matter how the concurrent slot calls
//! interleaved. Partial failure degrades: the course keeps every successful
//! section in its original relative order and the failure count travels
//! alongside for caller reporting. Only the total loss of every slot is
//! fatal.

use crate::course::{CourseContent, CourseOutline};
use crate::error::CourseGenError;
use crate::output::SectionResult;
use tracing::{info, warn};

/// The assembler's product: the course plus the failure accounting the
/// caller needs for an honest report.
#[derive(Debug)]
pub struct AssembledCourse {
    pub course: CourseContent,
    /// Slots that produced no section.
    pub failed_sections: usize,
    /// Activities dropped across all successful sections.
    pub dropped_activities: usize,
}

/// Merge slot results into a course.
///
/// Expects `results` sorted by slot index (the driver sorts after the
/// concurrent join). Succeeded sections are cloned in, never mutated.
///
/// # Errors
/// [`CourseGenError::GenerationFailed`] when zero slots succeeded; the
/// error carries the attempt count and the first slot error so callers can
/// show an actionable message.
pub fn assemble(
    outline: &CourseOutline,
    results: &[SectionResult],
) -> Result<AssembledCourse, CourseGenError> {
    let failed_sections = results.iter().filter(|r| !r.is_ok()).count();
    let dropped_activities = results.iter().map(|r| r.dropped_activities).sum();

    let sections: Vec<_> = results
        .iter()
        .filter_map(|r| r.section.clone())
        .collect();

    if sections.is_empty() {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(CourseGenError::GenerationFailed {
            attempted: results.len(),
            failed: failed_sections,
            first_error,
        });
    }

    if failed_sections > 0 {
        warn!(
            failed = failed_sections,
            kept = sections.len(),
            "assembling degraded course"
        );
    } else {
        info!(sections = sections.len(), "course assembled");
    }

    Ok(AssembledCourse {
        course: CourseContent {
            title: outline.title.clone(),
            description: outline.description.clone(),
            sections,
        },
        failed_sections,
        dropped_activities,
    })
}

//! Section content generation: one model call per outline entry.
//!
//! Each invocation is independent and stateless apart from read-only
//! context ([`SectionContext`]), so the driver is free to run any number of
//! them concurrently — no shared mutable state, no locks.
//!
//! ## Always returns a result
//!
//! [`generate_section`] never propagates an error upward: a single bad slot
//! must not abort the whole course, so failures are recorded inside the
//! returned [`SectionResult`] and absorbed later by the assembler. The whole
//! call — including its one possible malformed-output retry — is bounded by
//! `section_timeout_secs`, so a wedged provider resolves as a timeout
//! failure for the slot rather than a hang of the join.

use crate::config::GenerationConfig;
use crate::course::{Activity, CourseSection, SectionOutline};
use crate::error::SectionError;
use crate::output::SectionResult;
use crate::pipeline::decode::{decode_json, SectionDraft};
use crate::prompts;
use crate::provider::{ModelProvider, ModelRequest};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Read-only context shared by all section calls of one request.
///
/// `Arc`ed fields keep the fan-out clone-cheap; nothing here is ever
/// mutated after the outline step.
#[derive(Clone)]
pub struct SectionContext {
    pub source_text: Arc<str>,
    /// All outline titles in order; each slot sees the ones before it.
    pub outline_titles: Arc<Vec<String>>,
    pub clarifications: Arc<Vec<crate::course::ClarifyingAnswer>>,
}

/// Generate the section for one outline entry.
///
/// `index` is the entry's outline position; it is carried through the
/// result so assembly can restore outline order no matter when this slot
/// resolves.
pub async fn generate_section(
    provider: Arc<dyn ModelProvider>,
    index: usize,
    entry: SectionOutline,
    ctx: SectionContext,
    config: &GenerationConfig,
) -> SectionResult {
    let start = Instant::now();
    let budget = Duration::from_secs(config.section_timeout_secs);

    let mut result = match timeout(
        budget,
        generate_section_inner(&provider, index, &entry, &ctx, config),
    )
    .await
    {
        Ok(result) => result,
        Err(_elapsed) => {
            warn!(index, secs = config.section_timeout_secs, "section timed out");
            SectionResult {
                index,
                title: entry.title.clone(),
                section: None,
                dropped_activities: 0,
                input_tokens: 0,
                output_tokens: 0,
                duration_ms: 0,
                retried: false,
                error: Some(SectionError::Timeout {
                    index,
                    secs: config.section_timeout_secs,
                }),
            }
        }
    };

    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

/// The un-timed slot call: prompt, decode (with single retry), validate.
async fn generate_section_inner(
    provider: &Arc<dyn ModelProvider>,
    index: usize,
    entry: &SectionOutline,
    ctx: &SectionContext,
    config: &GenerationConfig,
) -> SectionResult {
    let prior_titles = &ctx.outline_titles[..index.min(ctx.outline_titles.len())];
    let user = prompts::section_user_prompt(
        entry,
        prior_titles,
        &ctx.clarifications,
        &ctx.source_text,
    );
    let mut request = ModelRequest {
        system: prompts::section_system_prompt(config.min_activities, config.max_activities),
        user,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let mut result = SectionResult {
        index,
        title: entry.title.clone(),
        section: None,
        dropped_activities: 0,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
        retried: false,
        error: None,
    };

    let response = match provider.generate(&request).await {
        Ok(r) => r,
        Err(e) => {
            warn!(index, error = %e, "section model call failed");
            result.error = Some(SectionError::ModelFailed {
                index,
                detail: e.to_string(),
            });
            return result;
        }
    };
    result.input_tokens += response.input_tokens;
    result.output_tokens += response.output_tokens;

    let draft = match decode_json::<SectionDraft>(&response.content) {
        Ok(draft) => draft,
        Err(first_err) => {
            warn!(index, error = %first_err, "section response failed to decode; retrying once");
            result.retried = true;
            request.user.push_str(prompts::STRICT_JSON_REMINDER);

            let response = match provider.generate(&request).await {
                Ok(r) => r,
                Err(e) => {
                    result.error = Some(SectionError::ModelFailed {
                        index,
                        detail: e.to_string(),
                    });
                    return result;
                }
            };
            result.input_tokens += response.input_tokens;
            result.output_tokens += response.output_tokens;

            match decode_json::<SectionDraft>(&response.content) {
                Ok(draft) => draft,
                Err(e) => {
                    result.error = Some(SectionError::Malformed {
                        index,
                        detail: format!("after retry: {e}"),
                    });
                    return result;
                }
            }
        }
    };

    let (activities, dropped) = validated_activities(draft.activities, config.max_activities);
    result.dropped_activities = dropped;

    if activities.is_empty() {
        result.error = Some(SectionError::EmptySection { index });
        return result;
    }

    // Prefer the model's title, fall back to the outline entry's.
    let title = if draft.title.trim().is_empty() {
        entry.title.clone()
    } else {
        draft.title.trim().to_string()
    };

    debug!(
        index,
        activities = activities.len(),
        dropped,
        "section generated"
    );
    result.section = Some(CourseSection::new(title, activities));
    result
}

/// Decode and validate each activity individually.
///
/// A value that fails to decode or fails its kind contract is dropped and
/// counted — never the whole section. Valid activities beyond
/// `max_activities` are also dropped (counted the same way) so section size
/// stays bounded.
fn validated_activities(
    raw: Vec<serde_json::Value>,
    max_activities: usize,
) -> (Vec<Activity>, usize) {
    let mut activities = Vec::new();
    let mut dropped = 0usize;

    for value in raw {
        match serde_json::from_value::<Activity>(value) {
            Ok(activity) => match activity.validate() {
                Ok(()) => {
                    if activities.len() < max_activities {
                        activities.push(activity);
                    } else {
                        dropped += 1;
                    }
                }
                Err(e) => {
                    warn!(kind = activity.kind(), error = %e, "dropping invalid activity");
                    dropped += 1;
                }
            },
            Err(e) => {
                warn!(error = %e, "dropping undecodable activity");
                dropped += 1;
            }
        }
    }

    (activities, dropped)
}

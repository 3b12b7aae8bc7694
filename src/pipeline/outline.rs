//! Outline generation: one model call producing the course skeleton.
//!
//! Strictly sequential and strictly first — section generation needs the
//! outline's entries, so nothing fans out until this step returns. The only
//! retry in the whole pipeline's model-call policy lives here and in the
//! section stage: exactly one reformulated attempt when the response fails
//! to decode. Transport and quota errors are never retried internally; the
//! caller owns that decision.

use crate::config::GenerationConfig;
use crate::course::{CourseOutline, SectionOutline};
use crate::error::CourseGenError;
use crate::pipeline::decode::{decode_json, OutlineDraft};
use crate::prompts;
use crate::provider::{ModelProvider, ModelRequest};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of the outline step, with token accounting for the stats.
#[derive(Debug)]
pub struct OutlineOutcome {
    pub outline: CourseOutline,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Whether the malformed-output retry fired.
    pub retried: bool,
}

/// Generate a course outline from cleaned source text.
///
/// # Errors
/// - [`CourseGenError::ModelUnavailable`] — transport/auth/quota failure
/// - [`CourseGenError::MalformedModelOutput`] — undecodable response after
///   the single reformulated retry
/// - [`CourseGenError::EmptyOutline`] — the response decoded but contained
///   zero usable sections
pub async fn generate_outline(
    provider: &Arc<dyn ModelProvider>,
    source_text: &str,
    config: &GenerationConfig,
) -> Result<OutlineOutcome, CourseGenError> {
    let user = prompts::outline_user_prompt(
        source_text,
        config.desired_section_count,
        &config.clarifications,
    );
    let mut request = ModelRequest {
        system: prompts::OUTLINE_SYSTEM_PROMPT.to_string(),
        user,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let mut input_tokens = 0u64;
    let mut output_tokens = 0u64;
    let mut retried = false;

    let response = provider.generate(&request).await.map_err(|e| {
        CourseGenError::ModelUnavailable {
            provider: provider.name().to_string(),
            detail: e.to_string(),
        }
    })?;
    input_tokens += u64::from(response.input_tokens);
    output_tokens += u64::from(response.output_tokens);

    let draft = match decode_json::<OutlineDraft>(&response.content) {
        Ok(draft) => draft,
        Err(first_err) => {
            warn!(error = %first_err, "outline response failed to decode; retrying once");
            retried = true;
            request.user.push_str(prompts::STRICT_JSON_REMINDER);

            let response = provider.generate(&request).await.map_err(|e| {
                CourseGenError::ModelUnavailable {
                    provider: provider.name().to_string(),
                    detail: e.to_string(),
                }
            })?;
            input_tokens += u64::from(response.input_tokens);
            output_tokens += u64::from(response.output_tokens);

            decode_json::<OutlineDraft>(&response.content).map_err(|e| {
                CourseGenError::MalformedModelOutput {
                    detail: format!("outline (after retry): {e}"),
                }
            })?
        }
    };

    let outline = outline_from_draft(draft, config.desired_section_count)?;
    debug!(
        sections = outline.sections.len(),
        title = %outline.title,
        "outline generated"
    );

    Ok(OutlineOutcome {
        outline,
        input_tokens,
        output_tokens,
        retried,
    })
}

/// Validate a decoded draft into a domain outline: non-empty title, section
/// stubs with titles, truncation to the requested budget.
fn outline_from_draft(
    draft: OutlineDraft,
    desired_section_count: usize,
) -> Result<CourseOutline, CourseGenError> {
    let title = draft.title.trim().to_string();
    if title.is_empty() {
        return Err(CourseGenError::MalformedModelOutput {
            detail: "outline has no title".into(),
        });
    }

    let mut sections: Vec<SectionOutline> = draft
        .sections
        .into_iter()
        .filter_map(|s| {
            let title = s.title.trim().to_string();
            if title.is_empty() {
                warn!("dropping outline entry with empty title");
                return None;
            }
            Some(SectionOutline {
                title,
                summary: s.summary.trim().to_string(),
            })
        })
        .collect();

    if sections.is_empty() {
        return Err(CourseGenError::EmptyOutline);
    }
    if sections.len() > desired_section_count {
        debug!(
            got = sections.len(),
            keeping = desired_section_count,
            "outline over-produced; truncating"
        );
        sections.truncate(desired_section_count);
    }

    let clarifying_questions = draft
        .clarifying_questions
        .into_iter()
        .filter_map(|q| q.into_domain())
        .collect();

    Ok(CourseOutline {
        title,
        description: draft.description.trim().to_string(),
        sections,
        clarifying_questions,
    })
}

//! System prompts for outline and section generation.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the response schema or tweaking
//!    an instruction requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live model, making prompt regressions easy to catch.
//!
//! The prompts describe the JSON each call must return; the decode step in
//! `pipeline::decode` is the enforcement side of that contract.

use crate::course::{ClarifyingAnswer, SectionOutline};
use std::fmt::Write as _;

/// Source text larger than this is truncated before being embedded in a
/// prompt. Keeps outline and section prompts inside every supported model's
/// context window with room for the response.
pub const MAX_SOURCE_CHARS: usize = 24_000;

/// System prompt for the outline call.
pub const OUTLINE_SYSTEM_PROMPT: &str = r#"You are an expert instructional designer. Your task is to read source material and plan a course as an ordered outline.

Follow these rules precisely:

1. STRUCTURE
   - Produce a course title, a one-or-two sentence description, and an ordered list of sections
   - Each section needs a title and a short summary of what it will teach
   - Order sections so each builds on the previous ones

2. GROUNDING
   - Base every section on the source material; do not invent topics it does not cover
   - If the material leaves an important choice open (audience level, depth), you may list clarifying questions

3. OUTPUT FORMAT
   - Respond with ONLY a JSON object, no commentary, no markdown fences
   - Shape:
     {
       "title": "...",
       "description": "...",
       "sections": [ { "title": "...", "summary": "..." } ],
       "clarifying_questions": [ { "question": "...", "options": ["..."] } ]
     }
   - "clarifying_questions" is optional; "options" may be empty for free-text questions"#;

/// System prompt for a single section-content call.
pub const SECTION_SYSTEM_PROMPT: &str = r#"You are an expert course author. Your task is to write one section of a course as a list of learning activities.

Follow these rules precisely:

1. ACTIVITIES
   - Produce between {min_activities} and {max_activities} activities
   - Allowed kinds and their required fields:
     - "text": { "kind": "text", "body": "markdown prose" }
     - "flashcard": { "kind": "flashcard", "front": "...", "back": "..." }
     - "multiple_choice": { "kind": "multiple_choice", "question": "...", "options": [ { "text": "...", "correct": true } ], "explanation": "..." }
     - "image": { "kind": "image", "caption": "...", "search_query": "..." }
   - A multiple_choice needs at least 2 options with EXACTLY ONE marked correct
   - Start the section with a text activity that introduces the topic

2. GROUNDING
   - Teach only what the source material supports
   - Do not repeat content already covered by earlier sections

3. OUTPUT FORMAT
   - Respond with ONLY a JSON object, no commentary, no markdown fences
   - Shape: { "title": "...", "activities": [ ... ] }"#;

/// Appended to the user prompt when the first response failed to decode.
/// The retry is the same request reformulated, not a different question.
pub const STRICT_JSON_REMINDER: &str = "\n\nIMPORTANT: your previous response could not be parsed. \
Respond with a single raw JSON object exactly matching the requested shape — \
no surrounding text, no markdown fences, no trailing commentary.";

/// Render the section system prompt with the configured activity bounds.
pub fn section_system_prompt(min_activities: usize, max_activities: usize) -> String {
    SECTION_SYSTEM_PROMPT
        .replace("{min_activities}", &min_activities.to_string())
        .replace("{max_activities}", &max_activities.to_string())
}

/// Build the outline user prompt: clarification answers, the section budget,
/// and the (possibly truncated) source text.
pub fn outline_user_prompt(
    source_text: &str,
    desired_section_count: usize,
    clarifications: &[ClarifyingAnswer],
) -> String {
    let mut prompt = String::with_capacity(source_text.len().min(MAX_SOURCE_CHARS) + 512);
    let _ = writeln!(
        prompt,
        "Plan a course with at most {desired_section_count} sections from the source material below."
    );
    push_clarifications(&mut prompt, clarifications);
    let _ = writeln!(prompt, "\nSOURCE MATERIAL:\n\"\"\"");
    prompt.push_str(truncate_source(source_text));
    prompt.push_str("\n\"\"\"");
    prompt
}

/// Build the user prompt for one section call: which entry to write, the
/// titles of the sections before it (continuity), clarifications, and the
/// source text.
pub fn section_user_prompt(
    entry: &SectionOutline,
    prior_titles: &[String],
    clarifications: &[ClarifyingAnswer],
    source_text: &str,
) -> String {
    let mut prompt = String::with_capacity(source_text.len().min(MAX_SOURCE_CHARS) + 512);
    let _ = writeln!(prompt, "Write the course section titled: {}", entry.title);
    if !entry.summary.trim().is_empty() {
        let _ = writeln!(prompt, "Section brief: {}", entry.summary);
    }
    if !prior_titles.is_empty() {
        let _ = writeln!(
            prompt,
            "\nSections already planned before this one (do not repeat their content):"
        );
        for (i, title) in prior_titles.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", i + 1, title);
        }
    }
    push_clarifications(&mut prompt, clarifications);
    let _ = writeln!(prompt, "\nSOURCE MATERIAL:\n\"\"\"");
    prompt.push_str(truncate_source(source_text));
    prompt.push_str("\n\"\"\"");
    prompt
}

fn push_clarifications(prompt: &mut String, clarifications: &[ClarifyingAnswer]) {
    if clarifications.is_empty() {
        return;
    }
    let _ = writeln!(prompt, "\nThe course owner answered these questions:");
    for c in clarifications {
        let _ = writeln!(prompt, "- Q: {}\n  A: {}", c.question, c.answer);
    }
}

/// Truncate on a char boundary at [`MAX_SOURCE_CHARS`].
fn truncate_source(source_text: &str) -> &str {
    match source_text.char_indices().nth(MAX_SOURCE_CHARS) {
        Some((byte_idx, _)) => &source_text[..byte_idx],
        None => source_text,
    }
}

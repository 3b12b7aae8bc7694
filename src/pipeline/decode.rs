//! Strict decoding of model output into draft shapes.
//!
//! Model text is never trusted: every response passes through
//! [`decode_json`], which strips the markdown fences models add despite
//! being told not to, slices out the JSON object when the model wrapped it
//! in commentary, and then lets serde enforce the shape. Downstream code
//! only ever sees a typed draft or a [`DecodeError`] — there is no ad hoc
//! field access on raw text anywhere in the pipeline.
//!
//! Drafts are deliberately looser than the domain types: activities arrive
//! as raw `serde_json::Value`s so one malformed activity can be dropped
//! individually instead of poisoning its whole section.

use crate::course::{AnswerShape, ClarifyingQuestion};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Why a model response failed to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response contains no JSON object")]
    NoJson,

    #[error("response is not valid JSON for the requested shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Wire shape of the outline call's response.
#[derive(Debug, Deserialize)]
pub struct OutlineDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sections: Vec<SectionStubDraft>,
    #[serde(default)]
    pub clarifying_questions: Vec<ClarifyingQuestionDraft>,
}

#[derive(Debug, Deserialize)]
pub struct SectionStubDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Deserialize)]
pub struct ClarifyingQuestionDraft {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl ClarifyingQuestionDraft {
    /// Promote to the domain type; empty questions yield None.
    pub fn into_domain(self) -> Option<ClarifyingQuestion> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return None;
        }
        let expected = if self.options.is_empty() {
            AnswerShape::FreeText
        } else {
            AnswerShape::Choice {
                options: self.options,
            }
        };
        Some(ClarifyingQuestion { question, expected })
    }
}

/// Wire shape of a section call's response. Activities stay untyped here;
/// the section stage decodes and validates them one by one.
#[derive(Debug, Deserialize)]
pub struct SectionDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub activities: Vec<serde_json::Value>,
}

/// Decode a model response into `T`: strip fences, slice the JSON object,
/// parse strictly.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    let unfenced = strip_code_fences(raw);
    let sliced = json_slice(&unfenced).ok_or(DecodeError::NoJson)?;
    Ok(serde_json::from_str(sliced)?)
}

// Models sometimes wrap output in ```json fences despite the prompt saying
// not to; the fence is noise, the payload inside is what we asked for.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").expect("valid regex"));

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

/// The substring from the first `{` to the last `}`, covering responses
/// that lead with "Here is the JSON you asked for:".
fn json_slice(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&input[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json_decodes() {
        let draft: OutlineDraft =
            decode_json(r#"{"title":"T","sections":[{"title":"S1","summary":"sum"}]}"#).unwrap();
        assert_eq!(draft.title, "T");
        assert_eq!(draft.sections.len(), 1);
    }

    #[test]
    fn fenced_json_decodes() {
        let raw = "```json\n{\"title\":\"T\",\"sections\":[]}\n```";
        let draft: OutlineDraft = decode_json(raw).unwrap();
        assert_eq!(draft.title, "T");
    }

    #[test]
    fn fenced_without_language_decodes() {
        let raw = "```\n{\"title\":\"T\",\"sections\":[]}\n```";
        let draft: OutlineDraft = decode_json(raw).unwrap();
        assert_eq!(draft.title, "T");
    }

    #[test]
    fn commentary_around_json_is_sliced_off() {
        let raw = "Sure, here's the outline:\n{\"title\":\"T\",\"sections\":[]}\nHope that helps!";
        let draft: OutlineDraft = decode_json(raw).unwrap();
        assert_eq!(draft.title, "T");
    }

    #[test]
    fn prose_without_json_is_no_json() {
        let err = decode_json::<OutlineDraft>("I could not process that document.").unwrap_err();
        assert!(matches!(err, DecodeError::NoJson));
    }

    #[test]
    fn wrong_shape_is_shape_error() {
        let err = decode_json::<OutlineDraft>(r#"{"sections": "not an array"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Shape(_)));
    }

    #[test]
    fn section_draft_keeps_activities_untyped() {
        let draft: SectionDraft = decode_json(
            r#"{"title":"S","activities":[{"kind":"text","body":"b"},{"kind":"mystery"}]}"#,
        )
        .unwrap();
        assert_eq!(draft.activities.len(), 2);
    }

    #[test]
    fn clarifying_question_with_options_is_choice() {
        let d = ClarifyingQuestionDraft {
            question: "Audience?".into(),
            options: vec!["Beginners".into(), "Experts".into()],
        };
        let q = d.into_domain().unwrap();
        assert!(matches!(q.expected, AnswerShape::Choice { .. }));
    }

    #[test]
    fn blank_clarifying_question_is_dropped() {
        let d = ClarifyingQuestionDraft {
            question: "   ".into(),
            options: vec![],
        };
        assert!(d.into_domain().is_none());
    }
}

//! Course domain model: the document the pipeline produces and the
//! intermediate outline it works from.
//!
//! [`CourseContent`] is the persistable artefact; [`CourseOutline`] and the
//! clarification types are ephemeral — inputs to section generation that are
//! discarded once the course is assembled. Activities are a closed set of
//! kinds ([`Activity`]); every instance must satisfy its kind's
//! required-field contract ([`Activity::validate`]) or it is rejected before
//! assembly.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ── Persistable document ─────────────────────────────────────────────────

/// A fully assembled course: title, description, and ordered sections.
///
/// Section order is significant and stable — it mirrors the outline the
/// course was generated from, not the order in which section calls happened
/// to complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseContent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub sections: Vec<CourseSection>,
}

/// One section of a course: a stable identifier, a title, and an ordered
/// list of activities.
///
/// The id is assigned once when the section is generated and never reused;
/// editors key unsaved changes and drag-reorder state on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSection {
    pub id: Uuid,
    pub title: String,
    pub activities: Vec<Activity>,
}

impl CourseSection {
    /// Create a section with a fresh v7 id.
    pub fn new(title: impl Into<String>, activities: Vec<Activity>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            activities,
        }
    }
}

/// One answer option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

/// One interactive unit within a section, drawn from a fixed closed set.
///
/// Serialised with an internal `kind` tag so stored courses and model
/// responses share one wire shape:
///
/// ```json
/// { "kind": "flashcard", "front": "Ohm's law", "back": "V = I × R" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Activity {
    /// A question with a fixed option list, exactly one of which is correct.
    MultipleChoice {
        question: String,
        options: Vec<AnswerOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explanation: Option<String>,
    },
    /// A two-sided study card.
    Flashcard { front: String, back: String },
    /// A block of explanatory prose (Markdown).
    Text { body: String },
    /// An illustration slot: a caption plus either a resolved image URL or
    /// a search query for the image provider to resolve later.
    Image {
        caption: String,
        #[serde(default)]
        search_query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl Activity {
    /// The wire-level kind tag, for logging and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Activity::MultipleChoice { .. } => "multiple_choice",
            Activity::Flashcard { .. } => "flashcard",
            Activity::Text { .. } => "text",
            Activity::Image { .. } => "image",
        }
    }

    /// Check this activity against its kind's required-field contract.
    ///
    /// Called on every model-produced activity before assembly; an `Err`
    /// means the activity is dropped (and counted), never persisted.
    pub fn validate(&self) -> Result<(), ActivityInvalid> {
        match self {
            Activity::MultipleChoice {
                question, options, ..
            } => {
                if question.trim().is_empty() {
                    return Err(ActivityInvalid::EmptyField {
                        kind: "multiple_choice",
                        field: "question",
                    });
                }
                if options.len() < 2 {
                    return Err(ActivityInvalid::TooFewOptions { got: options.len() });
                }
                if options.iter().any(|o| o.text.trim().is_empty()) {
                    return Err(ActivityInvalid::EmptyField {
                        kind: "multiple_choice",
                        field: "options[].text",
                    });
                }
                let correct = options.iter().filter(|o| o.correct).count();
                if correct != 1 {
                    return Err(ActivityInvalid::CorrectCount { got: correct });
                }
                Ok(())
            }
            Activity::Flashcard { front, back } => {
                if front.trim().is_empty() {
                    return Err(ActivityInvalid::EmptyField {
                        kind: "flashcard",
                        field: "front",
                    });
                }
                if back.trim().is_empty() {
                    return Err(ActivityInvalid::EmptyField {
                        kind: "flashcard",
                        field: "back",
                    });
                }
                Ok(())
            }
            Activity::Text { body } => {
                if body.trim().is_empty() {
                    return Err(ActivityInvalid::EmptyField {
                        kind: "text",
                        field: "body",
                    });
                }
                Ok(())
            }
            Activity::Image {
                caption,
                search_query,
                url,
            } => {
                if caption.trim().is_empty() {
                    return Err(ActivityInvalid::EmptyField {
                        kind: "image",
                        field: "caption",
                    });
                }
                let has_url = url.as_deref().is_some_and(|u| !u.trim().is_empty());
                if !has_url && search_query.trim().is_empty() {
                    return Err(ActivityInvalid::EmptyField {
                        kind: "image",
                        field: "search_query",
                    });
                }
                Ok(())
            }
        }
    }
}

/// Why an activity failed its kind contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityInvalid {
    #[error("{kind}: required field '{field}' is empty")]
    EmptyField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("multiple_choice: needs at least 2 options, got {got}")]
    TooFewOptions { got: usize },

    #[error("multiple_choice: exactly one option must be marked correct, got {got}")]
    CorrectCount { got: usize },
}

// ── Ephemeral generation inputs ──────────────────────────────────────────

/// The course skeleton produced by the outline step: a title plus ordered
/// section stubs. Input to per-section generation; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutline {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub sections: Vec<SectionOutline>,
    /// Questions the model wants answered before it can generate well.
    /// Surfaced to the caller; answers come back via
    /// [`crate::config::GenerationConfig::clarifications`] on a later run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clarifying_questions: Vec<ClarifyingQuestion>,
}

/// One outline entry: the section title plus a short brief that becomes
/// generation context for that section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutline {
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

/// What shape of answer a clarifying question expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum AnswerShape {
    /// Any free-text answer.
    FreeText,
    /// One of a fixed set of choices.
    Choice { options: Vec<String> },
}

/// A question the model asks when source material leaves something open
/// (e.g. target audience, depth). Ephemeral — part of the outline
/// round-trip, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyingQuestion {
    pub question: String,
    pub expected: AnswerShape,
}

/// The caller's answer to a [`ClarifyingQuestion`], fed back into the
/// generation prompts on the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyingAnswer {
    pub question: String,
    pub answer: String,
}

//! Persistence gateway boundary.
//!
//! Storage is an external collaborator — the pipeline owns a generated
//! course only until it is explicitly handed through [`CourseStore`].
//! The trait promises nothing beyond last-write-wins; concurrent-editor
//! coordination is the gateway implementation's problem, not the
//! pipeline's. [`MemoryStore`] is the in-process double used by tests and
//! local tooling.

use crate::course::CourseContent;
use crate::error::CourseGenError;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

/// Opaque error surfaced by a gateway implementation, passed through to
/// callers unchanged.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Stores and retrieves assembled courses. Last-write-wins; no
/// transactional semantics are assumed.
#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn save(&self, course_id: &str, course: &CourseContent) -> Result<(), StoreError>;

    /// `Ok(None)` when no course exists under `course_id`.
    async fn load(&self, course_id: &str) -> Result<Option<CourseContent>, StoreError>;
}

/// Persist a course, enforcing the persistence-time invariant: the title
/// must be non-empty. Generated courses always satisfy it (the outline step
/// rejects untitled outlines), but a caller can edit a title away before
/// saving — this is the last gate.
pub async fn save_course(
    store: &dyn CourseStore,
    course_id: &str,
    course: &CourseContent,
) -> Result<(), CourseGenError> {
    if course.title.trim().is_empty() {
        return Err(CourseGenError::Persistence(
            "course title must not be empty".into(),
        ));
    }
    store
        .save(course_id, course)
        .await
        .map_err(|e| CourseGenError::Persistence(e.to_string()))
}

/// Load a course through the gateway.
pub async fn load_course(
    store: &dyn CourseStore,
    course_id: &str,
) -> Result<Option<CourseContent>, CourseGenError> {
    store
        .load(course_id)
        .await
        .map_err(|e| CourseGenError::Persistence(e.to_string()))
}

/// In-memory gateway double.
#[derive(Default)]
pub struct MemoryStore {
    courses: Mutex<HashMap<String, CourseContent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn save(&self, course_id: &str, course: &CourseContent) -> Result<(), StoreError> {
        self.courses
            .lock()
            .await
            .insert(course_id.to_string(), course.clone());
        Ok(())
    }

    async fn load(&self, course_id: &str) -> Result<Option<CourseContent>, StoreError> {
        Ok(self.courses.lock().await.get(course_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{Activity, CourseSection};

    fn course(title: &str) -> CourseContent {
        CourseContent {
            title: title.into(),
            description: String::new(),
            sections: vec![CourseSection::new(
                "Intro",
                vec![Activity::Text {
                    body: "Welcome.".into(),
                }],
            )],
        }
    }

    #[tokio::test]
    async fn round_trip() {
        let store = MemoryStore::new();
        let c = course("Electronics 101");
        save_course(&store, "c1", &c).await.unwrap();
        let loaded = load_course(&store, "c1").await.unwrap().unwrap();
        assert_eq!(loaded, c);
    }

    #[tokio::test]
    async fn missing_course_is_none() {
        let store = MemoryStore::new();
        assert!(load_course(&store, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_title_rejected_at_persistence() {
        let store = MemoryStore::new();
        let err = save_course(&store, "c1", &course("   ")).await.unwrap_err();
        assert!(matches!(err, CourseGenError::Persistence(_)));
        // Nothing was written.
        assert!(load_course(&store, "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryStore::new();
        save_course(&store, "c1", &course("First")).await.unwrap();
        save_course(&store, "c1", &course("Second")).await.unwrap();
        let loaded = load_course(&store, "c1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Second");
    }
}

//! Progress-callback trait for pipeline events.
//!
//! Inject an `Arc<dyn GenerationProgressCallback>` via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline moves through its phases and section
//! slots resolve.
//!
//! Callbacks are the least-invasive integration point: callers can forward
//! events to a broadcast channel, a WebSocket pushing updates to the course
//! editor, or a terminal progress bar — without the library knowing anything
//! about how the host application communicates. The trait is `Send + Sync`
//! because section events fire concurrently from the fan-out tasks.

use crate::output::Phase;
use std::sync::Arc;

/// Called by the pipeline as a generation request advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_section_start`, `on_section_complete`, and `on_section_error` may be
/// called concurrently from different tasks, in any order relative to the
/// outline. Implementations must protect shared mutable state (`Mutex`,
/// atomics).
pub trait GenerationProgressCallback: Send + Sync {
    /// Called when the pipeline enters a new phase.
    fn on_phase(&self, phase: Phase) {
        let _ = phase;
    }

    /// Called once after the outline is ready, before any section call.
    ///
    /// # Arguments
    /// * `total_sections` — number of section slots that will be generated
    fn on_generation_start(&self, total_sections: usize) {
        let _ = total_sections;
    }

    /// Called just before a section slot's model call is dispatched.
    ///
    /// # Arguments
    /// * `section_num`    — 1-indexed outline position
    /// * `total_sections` — total slots in this request
    fn on_section_start(&self, section_num: usize, total_sections: usize) {
        let _ = (section_num, total_sections);
    }

    /// Called when a section slot resolves successfully.
    ///
    /// # Arguments
    /// * `activity_count` — validated activities the section ended up with
    fn on_section_complete(&self, section_num: usize, total_sections: usize, activity_count: usize) {
        let _ = (section_num, total_sections, activity_count);
    }

    /// Called when a section slot fails (model error, malformed output,
    /// timeout, or zero valid activities).
    fn on_section_error(&self, section_num: usize, total_sections: usize, error: &str) {
        let _ = (section_num, total_sections, error);
    }

    /// Called once after every slot has resolved and the course is
    /// assembled (or assembly failed).
    fn on_generation_complete(&self, total_sections: usize, success_count: usize) {
        let _ = (total_sections, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        phases: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_phase(&self, _phase: Phase) {
            self.phases.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_start(&self, _n: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_complete(&self, _n: usize, _total: usize, _activities: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_error(&self, _n: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_phase(Phase::Ingesting);
        cb.on_generation_start(4);
        cb.on_section_start(1, 4);
        cb.on_section_complete(1, 4, 5);
        cb.on_section_error(2, 4, "timed out");
        cb.on_generation_complete(4, 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            phases: AtomicUsize::new(0),
        };

        t.on_phase(Phase::GeneratingOutline);
        t.on_phase(Phase::GeneratingSections);
        t.on_section_start(1, 2);
        t.on_section_complete(1, 2, 4);
        t.on_section_start(2, 2);
        t.on_section_error(2, 2, "model call failed");

        assert_eq!(t.phases.load(Ordering::SeqCst), 2);
        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(t.completes.load(Ordering::SeqCst), 1);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn GenerationProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_generation_start(10);
        cb.on_section_start(1, 10);
    }
}

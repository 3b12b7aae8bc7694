//! Configuration for a course-generation request.
//!
//! All pipeline behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share a config across the fan-out tasks, log it, and
//! diff two runs to understand why their outputs differ.

use crate::course::ClarifyingAnswer;
use crate::error::CourseGenError;
use crate::progress::ProgressCallback;
use crate::provider::ModelProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for one generation request.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use courseforge::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .desired_section_count(6)
///     .concurrency(4)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Upper bound on outline length. Default: 5.
    ///
    /// The model is asked for at most this many sections and the outline is
    /// truncated if it over-produces, so a single request can never fan out
    /// into an unbounded number of section calls.
    pub desired_section_count: usize,

    /// Minimum activities requested per section. Default: 3.
    pub min_activities: usize,

    /// Maximum activities kept per section. Default: 8.
    ///
    /// Applied after validation: a section that decodes 12 valid activities
    /// keeps the first 8. Keeps section size (and editor rendering cost)
    /// predictable regardless of how chatty the model feels.
    pub max_activities: usize,

    /// Number of concurrent section-generation model calls. Default: 4.
    ///
    /// Section calls are network-bound and independent, so fanning out cuts
    /// wall-clock time roughly linearly — but every in-flight call counts
    /// against the provider's rate limit. 4 stays comfortably under the
    /// entry-tier limits of both supported providers; raise it if your
    /// account allows.
    pub concurrency: usize,

    /// Wall-clock budget for one whole section call, including its single
    /// possible retry. Default: 60.
    ///
    /// A slot that exceeds the budget resolves as a timeout failure for that
    /// slot; the join over all sections therefore never blocks indefinitely.
    pub section_timeout_secs: u64,

    /// Model identifier, e.g. "gpt-4.1-mini". If None, uses the resolved
    /// provider's default.
    pub model: Option<String>,

    /// Provider name ("openai", "anthropic"). If None along with
    /// `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    /// This is also the seam tests use to inject scripted fakes.
    pub provider: Option<Arc<dyn ModelProvider>>,

    /// Sampling temperature. Default: 0.4.
    ///
    /// Course content wants some variety in phrasing and examples but must
    /// stay grounded in the source text; 0.4 sits between transcription-cold
    /// and creative-writing-hot.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Answers to clarifying questions from an earlier outline round,
    /// threaded into both outline and section prompts.
    pub clarifications: Vec<ClarifyingAnswer>,

    /// Optional progress callback receiving phase and per-section events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            desired_section_count: 5,
            min_activities: 3,
            max_activities: 8,
            concurrency: 4,
            section_timeout_secs: 60,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.4,
            max_tokens: 4096,
            clarifications: Vec::new(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("desired_section_count", &self.desired_section_count)
            .field("min_activities", &self.min_activities)
            .field("max_activities", &self.max_activities)
            .field("concurrency", &self.concurrency)
            .field("section_timeout_secs", &self.section_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("clarifications", &self.clarifications.len())
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn desired_section_count(mut self, n: usize) -> Self {
        self.config.desired_section_count = n.max(1);
        self
    }

    pub fn min_activities(mut self, n: usize) -> Self {
        self.config.min_activities = n.max(1);
        self
    }

    pub fn max_activities(mut self, n: usize) -> Self {
        self.config.max_activities = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn section_timeout_secs(mut self, secs: u64) -> Self {
        self.config.section_timeout_secs = secs.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn clarifications(mut self, answers: Vec<ClarifyingAnswer>) -> Self {
        self.config.clarifications = answers;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating cross-field constraints.
    pub fn build(self) -> Result<GenerationConfig, CourseGenError> {
        let c = &self.config;
        if c.min_activities > c.max_activities {
            return Err(CourseGenError::InvalidConfig(format!(
                "min_activities ({}) exceeds max_activities ({})",
                c.min_activities, c.max_activities
            )));
        }
        if c.max_tokens == 0 {
            return Err(CourseGenError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = GenerationConfig::default();
        assert_eq!(c.desired_section_count, 5);
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.section_timeout_secs, 60);
        assert_eq!(c.min_activities, 3);
        assert_eq!(c.max_activities, 8);
    }

    #[test]
    fn builder_clamps_zeroes() {
        let c = GenerationConfig::builder()
            .concurrency(0)
            .desired_section_count(0)
            .section_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.desired_section_count, 1);
        assert_eq!(c.section_timeout_secs, 1);
    }

    #[test]
    fn builder_rejects_inverted_activity_bounds() {
        let err = GenerationConfig::builder()
            .min_activities(6)
            .max_activities(2)
            .build()
            .unwrap_err();
        assert!(matches!(err, CourseGenError::InvalidConfig(_)));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = GenerationConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}

//! Integration tests for the generation pipeline.
//!
//! Every test runs fully offline: a scripted [`MockProvider`] is injected
//! through `GenerationConfig::builder().provider(...)`, the same seam a
//! caller would use to wrap a real provider with caching or rate-limiting.
//! The mock keys its behaviour off the prompts the pipeline actually sends,
//! so these tests exercise the real prompt → decode → validate → assemble
//! path end to end.

use async_trait::async_trait;
use courseforge::{
    generate_course, generate_from_text, generate_stream, Activity, CourseGenError,
    GenerationConfig, ModelError, ModelProvider, ModelRequest, ModelResponse, SectionError,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ── Mock provider ────────────────────────────────────────────────────────

/// How the mock answers the section call for a given outline title.
#[derive(Clone)]
enum SectionBehavior {
    /// Respond with this JSON after an optional delay.
    Ok { json: String, delay_ms: u64 },
    /// Fail with a 503.
    Fail,
    /// Never respond (until far beyond any test's timeout).
    Hang,
    /// Respond with undecodable prose, every time.
    Malformed,
}

/// Scripted model provider. Outline calls pop responses from a list (the
/// last entry repeats); section calls look up their behaviour by the title
/// embedded in the prompt.
struct MockProvider {
    outline_responses: Vec<String>,
    outline_fails: bool,
    sections: HashMap<String, SectionBehavior>,
    outline_calls: AtomicUsize,
    section_calls: AtomicUsize,
}

impl MockProvider {
    fn new(outline_responses: Vec<String>) -> Self {
        Self {
            outline_responses,
            outline_fails: false,
            sections: HashMap::new(),
            outline_calls: AtomicUsize::new(0),
            section_calls: AtomicUsize::new(0),
        }
    }

    fn with_section(mut self, title: &str, behavior: SectionBehavior) -> Self {
        self.sections.insert(title.to_string(), behavior);
        self
    }

    fn failing_outline() -> Self {
        let mut p = Self::new(vec![]);
        p.outline_fails = true;
        p
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        if request.user.starts_with("Plan a course") {
            if self.outline_fails {
                return Err(ModelError::Api {
                    provider: "mock".into(),
                    status: 503,
                    detail: "overloaded".into(),
                });
            }
            let idx = self.outline_calls.fetch_add(1, Ordering::SeqCst);
            let content = self
                .outline_responses
                .get(idx.min(self.outline_responses.len().saturating_sub(1)))
                .cloned()
                .unwrap_or_default();
            return Ok(ModelResponse {
                content,
                input_tokens: 120,
                output_tokens: 80,
            });
        }

        // Section call: recover the outline title from the prompt.
        self.section_calls.fetch_add(1, Ordering::SeqCst);
        let title = request
            .user
            .lines()
            .find_map(|l| l.strip_prefix("Write the course section titled: "))
            .unwrap_or("")
            .to_string();

        match self.sections.get(&title).cloned() {
            Some(SectionBehavior::Ok { json, delay_ms }) => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(ModelResponse {
                    content: json,
                    input_tokens: 100,
                    output_tokens: 60,
                })
            }
            Some(SectionBehavior::Fail) => Err(ModelError::Api {
                provider: "mock".into(),
                status: 503,
                detail: "overloaded".into(),
            }),
            Some(SectionBehavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(ModelResponse {
                    content: String::new(),
                    input_tokens: 0,
                    output_tokens: 0,
                })
            }
            Some(SectionBehavior::Malformed) => Ok(ModelResponse {
                content: "I'm sorry, I can't produce JSON today.".into(),
                input_tokens: 100,
                output_tokens: 20,
            }),
            None => panic!("mock has no behaviour for section '{title}'"),
        }
    }
}

// ── JSON builders ────────────────────────────────────────────────────────

fn outline_json(title: &str, sections: &[&str]) -> String {
    let stubs: Vec<String> = sections
        .iter()
        .map(|t| format!(r#"{{"title":"{t}","summary":"About {t}."}}"#))
        .collect();
    format!(
        r#"{{"title":"{title}","description":"A generated course.","sections":[{}]}}"#,
        stubs.join(",")
    )
}

fn section_json(title: &str) -> String {
    format!(
        r#"{{"title":"{title}","activities":[
            {{"kind":"text","body":"Introduction to {title}."}},
            {{"kind":"flashcard","front":"Key term","back":"Its definition"}},
            {{"kind":"multiple_choice","question":"Which is true?",
              "options":[{{"text":"This one","correct":true}},{{"text":"Not this","correct":false}}],
              "explanation":"Because it is."}}
        ]}}"#
    )
}

fn source_text_words(n: usize) -> String {
    (0..n)
        .map(|i| format!("word{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn config_with(provider: MockProvider) -> (Arc<MockProvider>, GenerationConfig) {
    let provider = Arc::new(provider);
    let config = GenerationConfig::builder()
        .provider(Arc::clone(&provider) as Arc<dyn ModelProvider>)
        .build()
        .expect("valid config");
    (provider, config)
}

// ── End-to-end ───────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_generates_ordered_valid_course() {
    let provider = MockProvider::new(vec![outline_json(
        "Electronics 101",
        &["Charge", "Current", "Resistance"],
    )])
    .with_section("Charge", SectionBehavior::Ok { json: section_json("Charge"), delay_ms: 0 })
    .with_section("Current", SectionBehavior::Ok { json: section_json("Current"), delay_ms: 0 })
    .with_section(
        "Resistance",
        SectionBehavior::Ok { json: section_json("Resistance"), delay_ms: 0 },
    );
    let (provider, config) = config_with(provider);

    let source = source_text_words(2000);
    let output = generate_from_text(&source, &config).await.expect("generation succeeds");

    assert_eq!(output.course.title, "Electronics 101");
    assert!(
        (1..=config.desired_section_count).contains(&output.outline.sections.len()),
        "outline size within the requested budget"
    );
    assert_eq!(output.course.sections.len(), 3);
    assert_eq!(output.stats.generated_sections, 3);
    assert_eq!(output.stats.failed_sections, 0);
    assert!(output.stats.total_input_tokens > 0);

    for section in &output.course.sections {
        assert!(!section.activities.is_empty());
        for activity in &section.activities {
            activity.validate().expect("every assembled activity is schema-valid");
        }
    }
    assert_eq!(provider.outline_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.section_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn sections_assemble_in_outline_order_regardless_of_completion_order() {
    // First section resolves last, last resolves first.
    let provider = MockProvider::new(vec![outline_json("C", &["One", "Two", "Three"])])
        .with_section("One", SectionBehavior::Ok { json: section_json("One"), delay_ms: 300 })
        .with_section("Two", SectionBehavior::Ok { json: section_json("Two"), delay_ms: 150 })
        .with_section("Three", SectionBehavior::Ok { json: section_json("Three"), delay_ms: 0 });
    let (_, config) = config_with(provider);

    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();

    let titles: Vec<_> = output
        .course
        .sections
        .iter()
        .map(|s| s.title.as_str())
        .collect();
    assert_eq!(titles, vec!["One", "Two", "Three"]);

    // Slot records are index-sorted too.
    let indices: Vec<_> = output.sections.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

// ── Partial failure ──────────────────────────────────────────────────────

#[tokio::test]
async fn partial_failure_degrades_to_fewer_sections() {
    let provider = MockProvider::new(vec![outline_json("C", &["A", "B", "D"])])
        .with_section("A", SectionBehavior::Ok { json: section_json("A"), delay_ms: 0 })
        .with_section("B", SectionBehavior::Fail)
        .with_section("D", SectionBehavior::Ok { json: section_json("D"), delay_ms: 0 });
    let (_, config) = config_with(provider);

    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();

    assert_eq!(output.course.sections.len(), 2);
    assert_eq!(output.stats.failed_sections, 1);
    let failed = &output.sections[1];
    assert_eq!(failed.title, "B");
    assert!(matches!(
        failed.error,
        Some(SectionError::ModelFailed { index: 1, .. })
    ));
    // Relative order of survivors preserved.
    assert_eq!(output.course.sections[0].title, "A");
    assert_eq!(output.course.sections[1].title, "D");
}

#[tokio::test]
async fn all_sections_failing_is_generation_failed() {
    let provider = MockProvider::new(vec![outline_json("C", &["A", "B"])])
        .with_section("A", SectionBehavior::Fail)
        .with_section("B", SectionBehavior::Fail);
    let (_, config) = config_with(provider);

    let err = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap_err();
    match err {
        CourseGenError::GenerationFailed {
            attempted, failed, ..
        } => {
            assert_eq!(attempted, 2);
            assert_eq!(failed, 2);
        }
        other => panic!("expected GenerationFailed, got {other:?}"),
    }
}

// ── Validation gate ──────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_activities_are_dropped_and_counted() {
    // The quiz has zero correct answers marked → fails its kind contract.
    let bad_quiz_section = r#"{"title":"A","activities":[
        {"kind":"text","body":"Valid prose."},
        {"kind":"multiple_choice","question":"Broken?",
         "options":[{"text":"x","correct":false},{"text":"y","correct":false}]}
    ]}"#;
    let provider = MockProvider::new(vec![outline_json("C", &["A"])]).with_section(
        "A",
        SectionBehavior::Ok { json: bad_quiz_section.into(), delay_ms: 0 },
    );
    let (_, config) = config_with(provider);

    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();

    let section = &output.course.sections[0];
    assert_eq!(section.activities.len(), 1);
    assert!(matches!(section.activities[0], Activity::Text { .. }));
    assert_eq!(output.stats.dropped_activities, 1);
}

#[tokio::test]
async fn section_with_zero_valid_activities_fails_that_slot_only() {
    let all_invalid = r#"{"title":"A","activities":[
        {"kind":"flashcard","front":"","back":""},
        {"kind":"unknown_kind","stuff":1}
    ]}"#;
    let provider = MockProvider::new(vec![outline_json("C", &["A", "B"])])
        .with_section("A", SectionBehavior::Ok { json: all_invalid.into(), delay_ms: 0 })
        .with_section("B", SectionBehavior::Ok { json: section_json("B"), delay_ms: 0 });
    let (_, config) = config_with(provider);

    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();

    assert_eq!(output.course.sections.len(), 1);
    assert_eq!(output.course.sections[0].title, "B");
    assert!(matches!(
        output.sections[0].error,
        Some(SectionError::EmptySection { index: 0 })
    ));
}

// ── Ingestion boundary ───────────────────────────────────────────────────

#[tokio::test]
async fn text_below_minimum_is_insufficient_content() {
    let provider = MockProvider::new(vec![outline_json("C", &["A"])]);
    let (_, config) = config_with(provider);

    let short = "x".repeat(49);
    let err = generate_from_text(&short, &config).await.unwrap_err();
    assert!(matches!(
        err,
        CourseGenError::InsufficientContent { len: 49, min: 50 }
    ));
}

#[tokio::test]
async fn text_at_exactly_minimum_is_accepted() {
    let provider = MockProvider::new(vec![outline_json("C", &["A"])])
        .with_section("A", SectionBehavior::Ok { json: section_json("A"), delay_ms: 0 });
    let (_, config) = config_with(provider);

    let exactly_50 = "x".repeat(50);
    let output = generate_from_text(&exactly_50, &config).await.unwrap();
    assert_eq!(output.course.sections.len(), 1);
}

#[tokio::test]
async fn uploaded_plain_text_document_flows_through() {
    let provider = MockProvider::new(vec![outline_json("C", &["A"])])
        .with_section("A", SectionBehavior::Ok { json: section_json("A"), delay_ms: 0 });
    let (_, config) = config_with(provider);

    let bytes = source_text_words(500);
    let output = generate_course(bytes.as_bytes(), "text/plain", &config)
        .await
        .unwrap();
    assert_eq!(output.course.sections.len(), 1);
    assert!(output.stats.ingest_duration_ms <= output.stats.total_duration_ms);
}

// ── Timeout ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn hung_section_resolves_as_timeout_not_hang() {
    let provider = MockProvider::new(vec![outline_json("C", &["A", "B"])])
        .with_section("A", SectionBehavior::Hang)
        .with_section("B", SectionBehavior::Ok { json: section_json("B"), delay_ms: 0 });
    let provider = Arc::new(provider);
    let config = GenerationConfig::builder()
        .provider(Arc::clone(&provider) as Arc<dyn ModelProvider>)
        .section_timeout_secs(1)
        .build()
        .unwrap();

    let start = Instant::now();
    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();

    assert!(
        start.elapsed() < Duration::from_secs(10),
        "the join must not wait for the hung call"
    );
    assert!(matches!(
        output.sections[0].error,
        Some(SectionError::Timeout { index: 0, secs: 1 })
    ));
    assert_eq!(output.course.sections.len(), 1);
    assert_eq!(output.course.sections[0].title, "B");
}

// ── Outline policies ─────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_outline_retries_exactly_once_then_succeeds() {
    let provider = MockProvider::new(vec![
        "no JSON here, sorry".into(),
        outline_json("C", &["A"]),
    ])
    .with_section("A", SectionBehavior::Ok { json: section_json("A"), delay_ms: 0 });
    let (provider, config) = config_with(provider);

    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();
    assert_eq!(output.course.title, "C");
    assert_eq!(provider.outline_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn outline_malformed_after_retry_is_fatal() {
    let provider = MockProvider::new(vec!["still not JSON".into(), "nor this".into()]);
    let (provider, config) = config_with(provider);

    let err = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CourseGenError::MalformedModelOutput { .. }));
    assert_eq!(
        provider.outline_calls.load(Ordering::SeqCst),
        2,
        "exactly one retry, then fail"
    );
}

#[tokio::test]
async fn outline_with_zero_sections_is_empty_outline() {
    let provider = MockProvider::new(vec![outline_json("C", &[])]);
    let (_, config) = config_with(provider);

    let err = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CourseGenError::EmptyOutline));
}

#[tokio::test]
async fn outline_transport_failure_is_model_unavailable_without_retry() {
    let provider = MockProvider::failing_outline();
    let (_, config) = config_with(provider);

    let err = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, CourseGenError::ModelUnavailable { .. }));
}

#[tokio::test]
async fn over_produced_outline_limits_the_fanout() {
    let provider = MockProvider::new(vec![outline_json(
        "C",
        &["A", "B", "D", "E", "F", "G"],
    )])
    .with_section("A", SectionBehavior::Ok { json: section_json("A"), delay_ms: 0 })
    .with_section("B", SectionBehavior::Ok { json: section_json("B"), delay_ms: 0 })
    .with_section("D", SectionBehavior::Ok { json: section_json("D"), delay_ms: 0 })
    .with_section("E", SectionBehavior::Ok { json: section_json("E"), delay_ms: 0 });
    let provider = Arc::new(provider);
    let config = GenerationConfig::builder()
        .provider(Arc::clone(&provider) as Arc<dyn ModelProvider>)
        .desired_section_count(4)
        .build()
        .unwrap();

    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();
    assert_eq!(output.course.sections.len(), 4);
    assert_eq!(provider.section_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn clarifying_questions_surface_on_the_outline() {
    let outline = r#"{"title":"C","description":"d","sections":[{"title":"A","summary":""}],
        "clarifying_questions":[{"question":"What level are the learners?",
                                 "options":["Beginner","Advanced"]}]}"#;
    let provider = MockProvider::new(vec![outline.into()])
        .with_section("A", SectionBehavior::Ok { json: section_json("A"), delay_ms: 0 });
    let (_, config) = config_with(provider);

    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();
    assert_eq!(output.outline.clarifying_questions.len(), 1);
    assert_eq!(
        output.outline.clarifying_questions[0].question,
        "What level are the learners?"
    );
}

// ── Section retry ────────────────────────────────────────────────────────

#[tokio::test]
async fn persistently_malformed_section_fails_its_slot_after_one_retry() {
    let provider = MockProvider::new(vec![outline_json("C", &["A", "B"])])
        .with_section("A", SectionBehavior::Malformed)
        .with_section("B", SectionBehavior::Ok { json: section_json("B"), delay_ms: 0 });
    let (provider, config) = config_with(provider);

    let output = generate_from_text(&source_text_words(200), &config)
        .await
        .unwrap();

    assert!(matches!(
        output.sections[0].error,
        Some(SectionError::Malformed { index: 0, .. })
    ));
    assert!(output.sections[0].retried);
    // 1 first attempt + 1 retry for A, 1 for B.
    assert_eq!(provider.section_calls.load(Ordering::SeqCst), 3);
}

// ── Streaming ────────────────────────────────────────────────────────────

#[tokio::test]
async fn streaming_yields_one_result_per_outline_entry() {
    let provider = MockProvider::new(vec![outline_json("C", &["One", "Two", "Three"])])
        .with_section("One", SectionBehavior::Ok { json: section_json("One"), delay_ms: 200 })
        .with_section("Two", SectionBehavior::Fail)
        .with_section("Three", SectionBehavior::Ok { json: section_json("Three"), delay_ms: 0 });
    let (_, config) = config_with(provider);

    let generation = generate_stream(&source_text_words(200), &config)
        .await
        .unwrap();
    assert_eq!(generation.outline.sections.len(), 3);

    let results: Vec<_> = generation.sections.collect().await;
    assert_eq!(results.len(), 3);

    // Completion order differs from outline order; every index appears once.
    let mut indices: Vec<_> = results.iter().map(|r| r.index).collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2]);

    let failed: Vec<_> = results.iter().filter(|r| !r.is_ok()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 1);
}

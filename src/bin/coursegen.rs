//! CLI binary for courseforge.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use courseforge::{
    generate_course, Activity, GenerationConfig, GenerationProgressCallback, Phase,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────

/// Terminal progress callback: a live bar plus per-section log lines.
/// Works correctly when sections complete out of order (concurrent mode).
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar length is set dynamically by `on_generation_start`, once the
    /// outline (and therefore the section count) is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} sections  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_phase(&self, phase: Phase) {
        self.bar.set_message(phase.to_string());
    }

    fn on_generation_start(&self, total_sections: usize) {
        self.activate_bar(total_sections);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Outline ready — generating {total_sections} sections…"))
        ));
    }

    fn on_section_complete(&self, section_num: usize, total: usize, activity_count: usize) {
        self.bar.println(format!(
            "  {} Section {:>2}/{:<2}  {}",
            green("✓"),
            section_num,
            total,
            dim(&format!("{activity_count} activities")),
        ));
        self.bar.inc(1);
    }

    fn on_section_error(&self, section_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Section {:>2}/{:<2}  {}",
            red("✗"),
            section_num,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_generation_complete(&self, total_sections: usize, success_count: usize) {
        let failed = total_sections.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} sections generated successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} sections generated  ({} failed)",
                if failed == total_sections {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_sections,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate a course from a PDF (stdout, JSON)
  coursegen lecture-notes.pdf

  # Write the course to a file
  coursegen slides.pptx -o course.json

  # Ask for a 7-section course from a specific provider
  coursegen --sections 7 --provider anthropic notes.docx

  # Plain-text source, human-readable summary
  coursegen --summary chapter.txt

  # Override the declared MIME type
  coursegen --mime text/plain notes.dat

SUPPORTED DOCUMENT TYPES:
  .pdf    application/pdf
  .docx   application/vnd.openxmlformats-officedocument.wordprocessingml.document
  .doc    application/msword (best-effort text salvage)
  .pptx   application/vnd.openxmlformats-officedocument.presentationml.presentation
  .txt    text/plain
  .md     text/markdown

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY        OpenAI API key
  ANTHROPIC_API_KEY     Anthropic API key
  COURSEFORGE_PROVIDER  Override provider (openai, anthropic)
  COURSEFORGE_MODEL     Override model ID

SETUP:
  1. Set API key:  export OPENAI_API_KEY=sk-...
  2. Generate:     coursegen lecture-notes.pdf -o course.json
"#;

/// Generate structured courses from documents using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "coursegen",
    version,
    about = "Generate structured, activity-based courses from documents using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the source document (PDF, DOCX, DOC, PPTX, TXT, MD).
    input: PathBuf,

    /// Write the course JSON to this file instead of stdout.
    #[arg(short, long, env = "COURSEGEN_OUTPUT")]
    output: Option<PathBuf>,

    /// Declared MIME type; inferred from the file extension if omitted.
    #[arg(long, env = "COURSEGEN_MIME")]
    mime: Option<String>,

    /// Maximum number of course sections.
    #[arg(short, long, env = "COURSEGEN_SECTIONS", default_value_t = 5)]
    sections: usize,

    /// Model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "COURSEFORGE_MODEL")]
    model: Option<String>,

    /// Provider: openai or anthropic. Auto-detected from API keys if unset.
    #[arg(long, env = "COURSEFORGE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent section-generation calls.
    #[arg(short, long, env = "COURSEGEN_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-section timeout in seconds.
    #[arg(long, env = "COURSEGEN_SECTION_TIMEOUT", default_value_t = 60)]
    section_timeout: u64,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "COURSEGEN_TEMPERATURE", default_value_t = 0.4)]
    temperature: f32,

    /// Max model output tokens per call.
    #[arg(long, env = "COURSEGEN_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Print a human-readable summary instead of course JSON.
    #[arg(long)]
    summary: bool,

    /// Disable the progress bar.
    #[arg(long, env = "COURSEGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "COURSEGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "COURSEGEN_QUIET")]
    quiet: bool,
}

/// Map a file extension onto the declared MIME type the library expects.
fn mime_from_extension(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase()
        .as_str()
    {
        "pdf" => Some("application/pdf"),
        "docx" => {
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        }
        "doc" => Some("application/msword"),
        "pptx" => {
            Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")
        }
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Resolve input ────────────────────────────────────────────────────
    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let mime = match cli.mime.as_deref() {
        Some(m) => m.to_string(),
        None => match mime_from_extension(&cli.input) {
            Some(m) => m.to_string(),
            None => bail!(
                "cannot infer document type of '{}'; pass --mime explicitly",
                cli.input.display()
            ),
        },
    };

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = GenerationConfig::builder()
        .desired_section_count(cli.sections)
        .concurrency(cli.concurrency)
        .section_timeout_secs(cli.section_timeout)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens);

    if let Some(model) = cli.model.clone() {
        builder = builder.model(model);
    }
    if let Some(provider) = cli.provider.clone() {
        builder = builder.provider_name(provider);
    }
    if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        builder = builder.progress_callback(cb as ProgressCallback);
    }

    let config = builder.build().context("invalid configuration")?;

    // ── Generate ─────────────────────────────────────────────────────────
    let output = generate_course(&bytes, &mime, &config)
        .await
        .context("course generation failed")?;

    // ── Emit ─────────────────────────────────────────────────────────────
    if cli.summary {
        print_summary(&output);
    } else {
        let json = serde_json::to_string_pretty(&output.course)
            .context("failed to serialise course")?;
        match &cli.output {
            Some(path) => {
                std::fs::write(path, json.as_bytes())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!("{} wrote course to {}", green("✔"), path.display());
                }
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(json.as_bytes())?;
                stdout.write_all(b"\n")?;
            }
        }
    }

    if !cli.quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "tokens: {} in / {} out  ·  {} ms total ({} ms outline, {} ms sections)",
                output.stats.total_input_tokens,
                output.stats.total_output_tokens,
                output.stats.total_duration_ms,
                output.stats.outline_duration_ms,
                output.stats.sections_duration_ms,
            ))
        );
    }

    Ok(())
}

fn print_summary(output: &courseforge::GenerationOutput) {
    println!("{}", bold(&output.course.title));
    if !output.course.description.is_empty() {
        println!("{}", output.course.description);
    }
    println!();

    for (i, section) in output.course.sections.iter().enumerate() {
        println!("{} {}", bold(&format!("{}.", i + 1)), section.title);
        for activity in &section.activities {
            let label = match activity {
                Activity::Text { .. } => "text",
                Activity::Flashcard { .. } => "flashcard",
                Activity::MultipleChoice { .. } => "quiz",
                Activity::Image { .. } => "image",
            };
            println!("   {} {}", dim("·"), label);
        }
    }

    if output.stats.failed_sections > 0 {
        println!();
        println!(
            "{}",
            red(&format!(
                "{} of {} sections failed to generate",
                output.stats.failed_sections, output.stats.total_sections
            ))
        );
    }

    if !output.outline.clarifying_questions.is_empty() {
        println!();
        println!("{}", cyan("The model asked for clarification:"));
        for q in &output.outline.clarifying_questions {
            println!("  - {}", q.question);
        }
    }
}

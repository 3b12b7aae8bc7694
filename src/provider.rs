//! Model provider boundary: one capability trait, two interchangeable
//! backends.
//!
//! The pipeline never branches on which vendor is in use — every call goes
//! through [`ModelProvider::generate`] with a system prompt, a user prompt,
//! and sampling options, and gets text back. Which implementation sits
//! behind the trait is a configuration choice resolved once per request by
//! [`resolve_provider`], from most-specific to least-specific:
//!
//! 1. **Pre-built provider** (`config.provider`) — the caller constructed
//!    the provider entirely; we use it as-is. This is also the injection
//!    seam tests use for scripted fakes.
//! 2. **Named provider + model** (`config.provider_name`) — reads the
//!    matching API key from the environment.
//! 3. **Environment pair** (`COURSEFORGE_PROVIDER` + `COURSEFORGE_MODEL`) —
//!    both set means the deployment chose at the environment level; honoured
//!    before auto-detection so the choice wins even when several keys are
//!    present.
//! 4. **Auto-detection** — first available API key, OpenAI preferred when
//!    multiple keys are set.

use crate::config::GenerationConfig;
use crate::error::CourseGenError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default models per backend. Overridable via config or environment.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// HTTP timeout for a single model API request. Generous because section
/// prompts embed the whole source text; the per-section wall-clock budget
/// is enforced separately in the pipeline.
const HTTP_TIMEOUT_SECS: u64 = 120;

/// One text-generation request: prompts plus sampling options.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The provider's reply: raw text plus token accounting.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Transport-level failure from a provider. The pipeline maps these to
/// [`CourseGenError::ModelUnavailable`] or a per-slot
/// [`crate::error::SectionError::ModelFailed`] depending on where the call
/// sat.
#[derive(Debug, Error)]
pub enum ModelError {
    /// 401/403 — the key is wrong or expired; retry will not help.
    #[error("authentication rejected by {provider}: {detail}")]
    Auth { provider: String, detail: String },

    /// 429 — quota or rate limit; `retry_after_secs` when the server said.
    #[error("rate limited by {provider}")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success HTTP status.
    #[error("{provider} API error (HTTP {status}): {detail}")]
    Api {
        provider: String,
        status: u16,
        detail: String,
    },

    /// Connection, DNS, TLS, or timeout failure before a status arrived.
    #[error("network error talking to {provider}: {detail}")]
    Network { provider: String, detail: String },
}

/// Capability interface over a generative text model.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short provider name for logs and error messages ("openai", …).
    fn name(&self) -> &str;

    /// Run one completion. Implementations do not retry — retry policy
    /// belongs to the pipeline.
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError>;
}

// ── OpenAI ───────────────────────────────────────────────────────────────

/// Chat-completions backend (`/v1/chat/completions`, Bearer auth).
///
/// `response_format: json_object` is requested so the model is steered
/// toward raw JSON; the strict decode step still validates everything.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".into(),
        }
    }

    /// Point at an alternative OpenAI-compatible endpoint (proxies, vLLM).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Deserialize)]
struct OpenAiReply {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Default)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(self.name(), e))?;

        let response = check_status(self.name(), response).await?;

        let reply: OpenAiReply = response.json().await.map_err(|e| ModelError::Api {
            provider: self.name().into(),
            status: 200,
            detail: format!("unreadable response body: {e}"),
        })?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let usage = reply.usage.unwrap_or_default();

        debug!(
            tokens_in = usage.prompt_tokens,
            tokens_out = usage.completion_tokens,
            "openai completion finished"
        );

        Ok(ModelResponse {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

// ── Anthropic ────────────────────────────────────────────────────────────

/// Messages-API backend (`/v1/messages`, `x-api-key` + version header).
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.anthropic.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Deserialize)]
struct AnthropicReply {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        let body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [
                { "role": "user", "content": request.user },
            ],
        });

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error(self.name(), e))?;

        let response = check_status(self.name(), response).await?;

        let reply: AnthropicReply = response.json().await.map_err(|e| ModelError::Api {
            provider: self.name().into(),
            status: 200,
            detail: format!("unreadable response body: {e}"),
        })?;

        let content = reply
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        let usage = reply.usage.unwrap_or_default();

        debug!(
            tokens_in = usage.input_tokens,
            tokens_out = usage.output_tokens,
            "anthropic completion finished"
        );

        Ok(ModelResponse {
            content,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
    }
}

// ── Shared plumbing ──────────────────────────────────────────────────────

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        // Builder only fails on TLS backend misconfiguration, which is a
        // compile-feature problem, not a runtime input.
        .unwrap_or_default()
}

fn network_error(provider: &str, e: reqwest::Error) -> ModelError {
    ModelError::Network {
        provider: provider.into(),
        detail: e.to_string(),
    }
}

/// Triage a non-success status into the matching [`ModelError`].
async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        let detail = body_snippet(response).await;
        return Err(ModelError::Auth {
            provider: provider.into(),
            detail,
        });
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(ModelError::RateLimited {
            provider: provider.into(),
            retry_after_secs,
        });
    }

    let detail = body_snippet(response).await;
    Err(ModelError::Api {
        provider: provider.into(),
        status: status.as_u16(),
        detail,
    })
}

/// First few hundred bytes of an error body — enough to diagnose, short
/// enough for a log line.
async fn body_snippet(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => body.chars().take(300).collect(),
        Err(_) => "<no body>".into(),
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Instantiate a named provider with the given model, reading the matching
/// API key from the environment.
fn create_named_provider(
    name: &str,
    model: Option<&str>,
) -> Result<Arc<dyn ModelProvider>, CourseGenError> {
    match name {
        "openai" => {
            let key = non_empty_env("OPENAI_API_KEY").ok_or_else(|| {
                CourseGenError::ProviderNotConfigured {
                    provider: "openai".into(),
                    hint: "Set OPENAI_API_KEY.".into(),
                }
            })?;
            Ok(Arc::new(OpenAiProvider::new(
                key,
                model.unwrap_or(DEFAULT_OPENAI_MODEL),
            )))
        }
        "anthropic" => {
            let key = non_empty_env("ANTHROPIC_API_KEY").ok_or_else(|| {
                CourseGenError::ProviderNotConfigured {
                    provider: "anthropic".into(),
                    hint: "Set ANTHROPIC_API_KEY.".into(),
                }
            })?;
            Ok(Arc::new(AnthropicProvider::new(
                key,
                model.unwrap_or(DEFAULT_ANTHROPIC_MODEL),
            )))
        }
        other => Err(CourseGenError::ProviderNotConfigured {
            provider: other.into(),
            hint: "Supported providers: openai, anthropic.".into(),
        }),
    }
}

/// Resolve the model provider for a request. See the module docs for the
/// four-level fallback chain.
pub fn resolve_provider(
    config: &GenerationConfig,
) -> Result<Arc<dyn ModelProvider>, CourseGenError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        return create_named_provider(name, config.model.as_deref());
    }

    // 3) Environment pair, checked before auto-detection so the deployment's
    //    model choice is honoured even when multiple API keys are present
    if let (Some(prov), Some(model)) = (
        non_empty_env("COURSEFORGE_PROVIDER"),
        non_empty_env("COURSEFORGE_MODEL"),
    ) {
        return create_named_provider(&prov, Some(&model));
    }

    // 4) Auto-detect. Prefer OpenAI explicitly when its key is present so
    //    users with multiple keys get a deterministic default.
    if non_empty_env("OPENAI_API_KEY").is_some() {
        return create_named_provider("openai", config.model.as_deref());
    }
    if non_empty_env("ANTHROPIC_API_KEY").is_some() {
        return create_named_provider("anthropic", config.model.as_deref());
    }

    Err(CourseGenError::ProviderNotConfigured {
        provider: "auto".into(),
        hint: "No model provider could be auto-detected from the environment.\n\
               Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or configure a provider explicitly."
            .into(),
    })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

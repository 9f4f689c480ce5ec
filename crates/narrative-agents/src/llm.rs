//! LLM backend abstraction and implementations.
//!
//! Enum dispatch over the completion APIs the fleet can write with: the
//! competition's hosted proxy, `OpenAI`-compatible chat completions and the
//! Anthropic Messages API. All backends talk HTTP via `reqwest` and return
//! raw text; cleaning happens in [`crate::textgen`].

use crate::config::{BackendType, LlmBackendConfig, Sampling};
use crate::error::GenerationError;
use crate::textgen::RenderedPrompt;

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An LLM backend that turns a prompt into text.
#[derive(Debug)]
pub enum LlmBackend {
    /// Competition completion proxy.
    Competition(CompetitionBackend),
    /// `OpenAI`-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send a prompt and return the completion text.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Backend`] if the HTTP call fails or the
    /// response has no text where the API puts it.
    pub async fn complete(
        &self,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, GenerationError> {
        match self {
            Self::Competition(backend) => backend.complete(prompt, sampling).await,
            Self::OpenAi(backend) => backend.complete(prompt, sampling).await,
            Self::Anthropic(backend) => backend.complete(prompt, sampling).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Competition(_) => "competition",
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

/// Connection details shared by every backend.
#[derive(Clone)]
struct Endpoint {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl Endpoint {
    fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Send a prepared request and return the JSON body of a 2xx response.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        label: &str,
    ) -> Result<serde_json::Value, GenerationError> {
        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::Backend(format!("{label} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(GenerationError::Backend(format!(
                "{label} returned {status}: {error_body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GenerationError::Backend(format!("{label} response parse failed: {e}")))
    }
}

impl core::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Endpoint")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Competition proxy backend
// ---------------------------------------------------------------------------

/// Backend for the competition's completion proxy.
///
/// Posts `{prompt, max_tokens, temperature, model}` straight to `api_url`
/// with the team invitation code as bearer token, and reads
/// `choices[0].text`.
#[derive(Debug)]
pub struct CompetitionBackend {
    endpoint: Endpoint,
}

impl CompetitionBackend {
    /// Create a proxy backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            endpoint: Endpoint::new(config),
        }
    }

    async fn complete(
        &self,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "prompt": prompt.flattened(),
            "max_tokens": sampling.max_tokens,
            "temperature": sampling.temperature,
            "model": self.endpoint.model,
        });

        let request = self
            .endpoint
            .client
            .post(&self.endpoint.api_url)
            .bearer_auth(&self.endpoint.api_key)
            .json(&body);
        let json = self.endpoint.send(request, "proxy").await?;
        extract_completion_text(&json)
    }
}

/// Extract the text from a legacy completions response.
fn extract_completion_text(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            GenerationError::Backend("proxy response missing choices[0].text".to_owned())
        })
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for `OpenAI`-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints.
/// Sends requests to `{api_url}/chat/completions`.
#[derive(Debug)]
pub struct OpenAiBackend {
    endpoint: Endpoint,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            endpoint: Endpoint::new(config),
        }
    }

    async fn complete(
        &self,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.endpoint.api_url);

        let body = serde_json::json!({
            "model": self.endpoint.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": sampling.temperature,
            "max_tokens": sampling.max_tokens,
        });

        let request = self
            .endpoint
            .client
            .post(&url)
            .bearer_auth(&self.endpoint.api_key)
            .json(&body);
        let json = self.endpoint.send(request, "OpenAI").await?;
        extract_openai_content(&json)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            GenerationError::Backend(
                "OpenAI response missing choices[0].message.content".to_owned(),
            )
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Uses the `x-api-key` header, sends the system prompt as a top-level
/// field and reads `content[0].text`.
#[derive(Debug)]
pub struct AnthropicBackend {
    endpoint: Endpoint,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            endpoint: Endpoint::new(config),
        }
    }

    async fn complete(
        &self,
        prompt: &RenderedPrompt,
        sampling: Sampling,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/messages", self.endpoint.api_url);

        let body = serde_json::json!({
            "model": self.endpoint.model,
            "max_tokens": sampling.max_tokens,
            "temperature": sampling.temperature,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let request = self
            .endpoint
            .client
            .post(&url)
            .header("x-api-key", &self.endpoint.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body);
        let json = self.endpoint.send(request, "Anthropic").await?;
        extract_anthropic_content(&json)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            GenerationError::Backend("Anthropic response missing content[0].text".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an LLM backend from configuration.
pub fn create_backend(config: &LlmBackendConfig) -> LlmBackend {
    match config.backend_type {
        BackendType::Competition => LlmBackend::Competition(CompetitionBackend::new(config)),
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
    }
}

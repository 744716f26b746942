//! Generative content adapter over an OpenRouter-compatible API.
//!
//! One bounded external call per request, a defensive parse ladder over the
//! raw text, and caller-declared schema validation. The adapter never
//! invents fallbacks — callers needing partial-failure tolerance (e.g.
//! "take the first N unranked") supply their own.

mod parse;
mod schema;

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::instrument;

use prospector_shared::{OpenRouterConfig, ProspectorError, Result};

pub use parse::extract_json;
pub use schema::{BoundedScore, check_bounds, require_keys};

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("Prospector/", env!("CARGO_PKG_VERSION"));

/// Near-zero temperature for classification-like tasks.
pub const TEMPERATURE_CLASSIFY: f32 = 0.1;

/// Moderate temperature for generative copy.
pub const TEMPERATURE_COPY: f32 = 0.7;

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// A structured-generation request: instruction text embedding a JSON-shape
/// description, plus the validation contract for the response.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Instruction text; must describe the expected JSON shape.
    pub instruction: String,
    /// Sampling temperature for the call.
    pub temperature: f32,
    /// Output token cap; `None` uses the configured default.
    pub max_tokens: Option<u32>,
    /// Required keys as dotted paths, top-level and nested.
    pub required_keys: Vec<String>,
    /// Bounded numeric score fields.
    pub bounded_scores: Vec<BoundedScore>,
}

impl GenerationRequest {
    /// A generative-copy request with no validation contract yet.
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            temperature: TEMPERATURE_COPY,
            max_tokens: None,
            required_keys: Vec::new(),
            bounded_scores: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn require(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }

    pub fn bound(mut self, path: impl Into<String>, min: f64, max: f64) -> Self {
        self.bounded_scores.push(BoundedScore::new(path, min, max));
        self
    }
}

// ---------------------------------------------------------------------------
// Wire shapes (chat completions)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for the generation provider.
pub struct GenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_output_tokens: u32,
}

impl GenAiClient {
    /// Create a new client from provider config and a resolved API key.
    pub fn new(config: &OpenRouterConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProspectorError::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.default_model.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Model identifier used for calls (and cache keying).
    pub fn model(&self) -> &str {
        &self.model
    }

    /// One bounded generation call, parsed and validated.
    ///
    /// Failure modes: `Upstream` (HTTP/network), `Unparseable` (no ladder
    /// stage recovered JSON), `Schema` (missing key or bad bounded score).
    #[instrument(skip_all, fields(temperature = request.temperature))]
    pub async fn generate_structured(&self, request: &GenerationRequest) -> Result<Value> {
        let raw = self.complete(request).await?;
        let value = parse::extract_json(&raw)?;
        schema::require_keys(&value, &request.required_keys)?;
        schema::check_bounds(&value, &request.bounded_scores)?;
        Ok(value)
    }

    /// Issue the chat-completions call and return the raw message text.
    async fn complete(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.instruction,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens.unwrap_or(self.max_output_tokens),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProspectorError::Upstream(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProspectorError::Upstream(format!("{url}: HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProspectorError::Upstream(format!("{url}: invalid response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProspectorError::Upstream(format!("{url}: response has no choices")))
    }
}

/// Cache key for a generation call: SHA-256 over instruction and model.
pub fn prompt_hash(instruction: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(instruction.as_bytes());
    hasher.update(model.as_bytes());
    format!("{:x}", hasher.finalize())
}

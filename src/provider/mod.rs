//! Provider adapters.
//!
//! Each adapter wraps one text-generation endpoint: it builds a prompt
//! from the deal, makes exactly one HTTP call and normalizes the
//! provider's response envelope to plain text. Adapters never retry;
//! retries and timeouts belong to the orchestrator.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod prompts;

pub use prompts::{build_prompt, Prompt, Specialization};

use crate::error::{AdapterError, ConfigError};
use crate::models::DealInput;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Contract every analysis provider satisfies.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Display name of the model/service.
    fn name(&self) -> &str;

    /// Fixed reliability weight for this provider's results.
    fn confidence(&self) -> f64;

    /// Analyze `deal` and return the provider's raw response text.
    async fn analyze(&self, deal: &DealInput) -> Result<String, AdapterError>;
}

/// Response envelope spoken by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `/chat/completions` style (OpenAI, Perplexity, xAI, gateways).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Google Gemini `generateContent`.
    Gemini,
    /// Local Ollama `/api/chat`.
    Ollama,
}

impl ProviderKind {
    /// Whether calls need an API key.
    pub fn requires_credential(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

/// A provider with its credential resolved, ready to build an adapter.
#[derive(Clone)]
pub struct ProviderSettings {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub specialization: Specialization,
    pub confidence: f64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub structured_output: bool,
    pub timeout_seconds: u64,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("specialization", &self.specialization)
            .field("confidence", &self.confidence)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("structured_output", &self.structured_output)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl ProviderSettings {
    /// The prompt this provider would send for `deal`.
    pub fn prompt_for(&self, deal: &DealInput) -> Prompt {
        build_prompt(self.specialization, deal, self.structured_output)
    }
}

/// Build the adapter matching `settings.kind`.
pub fn build_adapter(settings: &ProviderSettings) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    let adapter: Arc<dyn ProviderAdapter> = match settings.kind {
        ProviderKind::OpenAi => Arc::new(openai::OpenAiAdapter::new(settings.clone())?),
        ProviderKind::Anthropic => Arc::new(anthropic::AnthropicAdapter::new(settings.clone())?),
        ProviderKind::Gemini => Arc::new(gemini::GeminiAdapter::new(settings.clone())?),
        ProviderKind::Ollama => Arc::new(ollama::OllamaAdapter::new(settings.clone())?),
    };

    debug!(
        "Built {} adapter for {} ({})",
        settings.kind, settings.name, settings.model
    );

    Ok(adapter)
}

/// Build adapters for every resolved provider, preserving order.
pub fn build_adapters(
    settings: &[ProviderSettings],
) -> Result<Vec<Arc<dyn ProviderAdapter>>, ConfigError> {
    settings.iter().map(build_adapter).collect()
}

/// Create the HTTP client an adapter owns.
pub(crate) fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Send a prepared request and decode the JSON response envelope.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    endpoint: &str,
    timeout_seconds: u64,
) -> Result<T, AdapterError> {
    let response = request
        .send()
        .await
        .map_err(|e| AdapterError::from_reqwest(e, endpoint, timeout_seconds))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AdapterError::from_reqwest(e, endpoint, timeout_seconds))?;

    if !status.is_success() {
        return Err(AdapterError::status(status.as_u16(), &body));
    }

    decode_body(&body)
}

/// Decode a response body, distinguishing empty from malformed.
pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, AdapterError> {
    if body.trim().is_empty() {
        return Err(AdapterError::EmptyBody);
    }

    serde_json::from_str(body).map_err(|e| AdapterError::MalformedBody(e.to_string()))
}

/// Reject responses whose extracted text is blank.
pub(crate) fn non_empty(text: String) -> Result<String, AdapterError> {
    if text.trim().is_empty() {
        Err(AdapterError::EmptyBody)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) fn test_settings(kind: ProviderKind) -> ProviderSettings {
    ProviderSettings {
        name: "Test Provider".to_string(),
        kind,
        model: "test-model".to_string(),
        endpoint: "http://localhost:9".to_string(),
        api_key: Some("test-key".to_string()),
        specialization: Specialization::Comprehensive,
        confidence: 0.9,
        temperature: 0.3,
        max_tokens: 2048,
        structured_output: false,
        timeout_seconds: 30,
    }
}

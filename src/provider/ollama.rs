//! Adapter for a local Ollama server.

use super::prompts::ChatMessage;
use super::{http_client, non_empty, send_json, ProviderAdapter, ProviderSettings};
use crate::error::{AdapterError, ConfigError};
use crate::models::DealInput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Ollama provider.
pub struct OllamaAdapter {
    settings: ProviderSettings,
    http_client: reqwest::Client,
}

impl OllamaAdapter {
    pub fn new(settings: ProviderSettings) -> Result<Self, ConfigError> {
        let http_client = http_client(settings.timeout_seconds)?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    fn url(&self) -> String {
        format!("{}/api/chat", self.settings.endpoint)
    }

    fn request_body(&self, deal: &DealInput) -> OllamaChatRequest {
        let prompt = self.settings.prompt_for(deal);

        OllamaChatRequest {
            model: self.settings.model.clone(),
            messages: prompt.to_messages(),
            stream: false,
            format: self.settings.structured_output.then(|| "json".to_string()),
            options: OllamaOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn confidence(&self) -> f64 {
        self.settings.confidence
    }

    async fn analyze(&self, deal: &DealInput) -> Result<String, AdapterError> {
        let url = self.url();
        let body = self.request_body(deal);
        debug!("Sending chat request to {} (model {})", url, self.settings.model);

        let response: OllamaChatResponse = send_json(
            self.http_client.post(&url).json(&body),
            &self.settings.endpoint,
            self.settings.timeout_seconds,
        )
        .await?;

        non_empty(response.message.content)
    }
}

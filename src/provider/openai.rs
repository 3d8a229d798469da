//! Adapter for `/chat/completions` style endpoints.
//!
//! Covers OpenAI itself and every service that mirrors its envelope
//! (Perplexity, xAI, OpenAI-compatible gateways).

use super::prompts::ChatMessage;
use super::{http_client, non_empty, send_json, ProviderAdapter, ProviderSettings};
use crate::error::{AdapterError, ConfigError};
use crate::models::DealInput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions provider.
pub struct OpenAiAdapter {
    settings: ProviderSettings,
    http_client: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new(settings: ProviderSettings) -> Result<Self, ConfigError> {
        let http_client = http_client(settings.timeout_seconds)?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    fn request_body(&self, deal: &DealInput) -> ChatCompletionRequest {
        let prompt = self.settings.prompt_for(deal);

        ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: prompt.to_messages(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            response_format: self.settings.structured_output.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

fn extract_text(response: ChatCompletionResponse) -> Result<String, AdapterError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::MalformedBody("response has no choices".to_string()))?
        .message
        .content
        .unwrap_or_default();

    non_empty(content)
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn confidence(&self) -> f64 {
        self.settings.confidence
    }

    async fn analyze(&self, deal: &DealInput) -> Result<String, AdapterError> {
        let body = self.request_body(deal);
        debug!(
            "Sending chat completion to {} (model {})",
            self.settings.endpoint, self.settings.model
        );

        let mut request = self.http_client.post(&self.settings.endpoint).json(&body);
        if let Some(ref key) = self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response: ChatCompletionResponse = send_json(
            request,
            &self.settings.endpoint,
            self.settings.timeout_seconds,
        )
        .await?;

        extract_text(response)
    }
}

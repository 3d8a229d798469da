//! Adapter for the Anthropic Messages API.

use super::{http_client, non_empty, send_json, ProviderAdapter, ProviderSettings};
use crate::error::{AdapterError, ConfigError};
use crate::models::DealInput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<UserMessage>,
}

#[derive(Debug, Serialize)]
struct UserMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Claude provider.
pub struct AnthropicAdapter {
    settings: ProviderSettings,
    http_client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new(settings: ProviderSettings) -> Result<Self, ConfigError> {
        let http_client = http_client(settings.timeout_seconds)?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    fn request_body(&self, deal: &DealInput) -> MessagesRequest {
        let prompt = self.settings.prompt_for(deal);

        MessagesRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            system: prompt.system,
            messages: vec![UserMessage {
                role: "user",
                content: prompt.user,
            }],
        }
    }
}

/// Join every text block; tool-use and other block types are ignored.
fn extract_text(response: MessagesResponse) -> Result<String, AdapterError> {
    if response.content.is_empty() {
        return Err(AdapterError::MalformedBody(
            "response has no content blocks".to_string(),
        ));
    }

    let text = response
        .content
        .into_iter()
        .filter(|block| block.block_type == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");

    non_empty(text)
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn confidence(&self) -> f64 {
        self.settings.confidence
    }

    async fn analyze(&self, deal: &DealInput) -> Result<String, AdapterError> {
        let body = self.request_body(deal);
        debug!(
            "Sending messages request to {} (model {})",
            self.settings.endpoint, self.settings.model
        );

        let mut request = self
            .http_client
            .post(&self.settings.endpoint)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(ref key) = self.settings.api_key {
            request = request.header("x-api-key", key);
        }

        let response: MessagesResponse = send_json(
            request,
            &self.settings.endpoint,
            self.settings.timeout_seconds,
        )
        .await?;

        extract_text(response)
    }
}

//! Adapter for Google Gemini `generateContent`.

use super::{http_client, non_empty, send_json, ProviderAdapter, ProviderSettings};
use crate::error::{AdapterError, ConfigError};
use crate::models::DealInput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

/// Google Gemini provider.
pub struct GeminiAdapter {
    settings: ProviderSettings,
    http_client: reqwest::Client,
}

impl GeminiAdapter {
    pub fn new(settings: ProviderSettings) -> Result<Self, ConfigError> {
        let http_client = http_client(settings.timeout_seconds)?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    /// `{endpoint}/models/{model}:generateContent`
    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint, self.settings.model
        )
    }

    fn request_body(&self, deal: &DealInput) -> GenerateContentRequest {
        let prompt = self.settings.prompt_for(deal);
        let text_content = |role: Option<&str>, text: String| Content {
            role: role.map(String::from),
            parts: vec![Part { text: Some(text) }],
        };

        GenerateContentRequest {
            system_instruction: prompt.system.map(|s| text_content(None, s)),
            contents: vec![text_content(Some("user"), prompt.user)],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_tokens,
                response_mime_type: self
                    .settings
                    .structured_output
                    .then(|| "application/json".to_string()),
            },
        }
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, AdapterError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AdapterError::MalformedBody("response has no candidates".to_string()))?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    non_empty(text)
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn confidence(&self) -> f64 {
        self.settings.confidence
    }

    async fn analyze(&self, deal: &DealInput) -> Result<String, AdapterError> {
        let url = self.url();
        let body = self.request_body(deal);
        debug!("Sending generateContent to {}", url);

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.settings.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let response: GenerateContentResponse =
            send_json(request, &url, self.settings.timeout_seconds).await?;

        extract_text(response)
    }
}

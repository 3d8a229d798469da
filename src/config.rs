//! Configuration file handling.
//!
//! This module handles loading `.dealsynth.toml`, merging CLI overrides
//! and resolving provider credentials from the environment into an
//! explicit list of [`ProviderSettings`].

use crate::error::ConfigError;
use crate::provider::{ProviderKind, ProviderSettings, Specialization};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".dealsynth.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Fan-out settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Analysis providers, in dispatch order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            providers: default_providers(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "deal_analysis.md".to_string()
}

/// Orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Per-provider timeout in seconds (applies to each attempt).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Extra attempts after a retryable failure.
    #[serde(default)]
    pub retries: usize,

    /// First backoff delay in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            retries: 0,
            retry_base_delay_ms: default_retry_base_delay(),
        }
    }
}

impl OrchestratorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidSetting(
                "orchestrator.timeout_seconds must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_base_delay() -> u64 {
    500
}

/// One analysis provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name, also used by `--providers`.
    pub name: String,

    /// Wire format of the endpoint.
    pub kind: ProviderKind,

    /// Model identifier sent to the endpoint.
    pub model: String,

    /// Endpoint URL.
    pub endpoint: String,

    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Analysis angle the prompt takes.
    #[serde(default)]
    pub specialization: Specialization,

    /// Reliability weight used by the aggregator.
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Output token ceiling.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Ask the provider for a JSON object instead of prose.
    #[serde(default)]
    pub structured_output: bool,

    /// Include this provider in the batch.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_confidence() -> f64 {
    0.8
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_true() -> bool {
    true
}

#[allow(clippy::too_many_arguments)]
fn provider(
    name: &str,
    kind: ProviderKind,
    model: &str,
    endpoint: &str,
    api_key_env: &str,
    specialization: Specialization,
    confidence: f64,
) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        kind,
        model: model.to_string(),
        endpoint: endpoint.to_string(),
        api_key_env: Some(api_key_env.to_string()),
        specialization,
        confidence,
        temperature: default_temperature(),
        max_tokens: default_max_tokens(),
        structured_output: false,
        enabled: true,
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        provider(
            "Perplexity Sonar Pro",
            ProviderKind::OpenAi,
            "sonar-pro",
            "https://api.perplexity.ai/chat/completions",
            "SONAR_API_KEY",
            Specialization::MarketResearch,
            0.85,
        ),
        provider(
            "OpenAI GPT-4",
            ProviderKind::OpenAi,
            "gpt-4",
            "https://api.openai.com/v1/chat/completions",
            "OPENAI_API_KEY",
            Specialization::Comprehensive,
            0.93,
        ),
        provider(
            "Google Gemini 2.5 Flash",
            ProviderKind::Gemini,
            "gemini-2.5-flash",
            "https://generativelanguage.googleapis.com/v1beta",
            "GEMINI_API_KEY",
            Specialization::FinancialMetrics,
            0.9,
        ),
        provider(
            "xAI Grok",
            ProviderKind::OpenAi,
            "grok-beta",
            "https://api.x.ai/v1/chat/completions",
            "XAI_API_KEY",
            Specialization::StrategicRisk,
            0.88,
        ),
        provider(
            "Anthropic Claude Sonnet",
            ProviderKind::Anthropic,
            "claude-sonnet-4-5",
            "https://api.anthropic.com/v1/messages",
            "ANTHROPIC_API_KEY",
            Specialization::DueDiligence,
            0.92,
        ),
    ]
}

/// Whether a configured provider can join the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Disabled,
    /// The named environment variable is unset or empty.
    MissingCredential(String),
}

impl ProviderConfig {
    /// Check whether this provider has what it needs to run.
    pub fn availability<F>(&self, lookup: F) -> Availability
    where
        F: Fn(&str) -> Option<String>,
    {
        if !self.enabled {
            return Availability::Disabled;
        }

        if !self.kind.requires_credential() {
            return Availability::Available;
        }

        match self.api_key_env.as_deref() {
            Some(var) => match lookup(var) {
                Some(key) if !key.trim().is_empty() => Availability::Available,
                _ => Availability::MissingCredential(var.to_string()),
            },
            None => Availability::MissingCredential("api_key_env".to_string()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidProvider {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(invalid("confidence must be between 0.0 and 1.0"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature must be between 0.0 and 2.0"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens must be at least 1"));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(invalid("endpoint must start with 'http://' or 'https://'"));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .orchestrator
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(timeout) = args.timeout {
            self.orchestrator.timeout_seconds = timeout;
        }

        if let Some(retries) = args.retries {
            self.orchestrator.retries = retries;
        }

        if let Some(ref names) = args.providers {
            self.restrict_providers(names);
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Disable every provider whose name is not in `names` (case-insensitive).
    pub fn restrict_providers(&mut self, names: &[String]) {
        let wanted: Vec<String> = names.iter().map(|n| n.trim().to_lowercase()).collect();

        for provider in &mut self.providers {
            if !wanted.contains(&provider.name.to_lowercase()) {
                debug!("Provider {} not selected, disabling", provider.name);
                provider.enabled = false;
            }
        }
    }

    /// Resolve credentials from the process environment.
    pub fn resolve_providers(&self) -> Result<Vec<ProviderSettings>, ConfigError> {
        self.resolve_providers_with(|var| std::env::var(var).ok())
    }

    /// Resolve credentials through `lookup`, excluding unavailable providers.
    ///
    /// Fails if a provider is misconfigured or if no provider is left.
    pub fn resolve_providers_with<F>(&self, lookup: F) -> Result<Vec<ProviderSettings>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut resolved = Vec::new();

        for provider in &self.providers {
            match provider.availability(&lookup) {
                Availability::Available => {}
                Availability::Disabled => continue,
                Availability::MissingCredential(var) => {
                    warn!(
                        "Provider {} unavailable: {} is not set, excluding it",
                        provider.name, var
                    );
                    continue;
                }
            }

            provider.validate()?;

            let api_key = provider
                .api_key_env
                .as_deref()
                .and_then(&lookup)
                .filter(|k| !k.trim().is_empty());

            resolved.push(ProviderSettings {
                name: provider.name.clone(),
                kind: provider.kind,
                model: provider.model.clone(),
                endpoint: provider.endpoint.trim_end_matches('/').to_string(),
                api_key,
                specialization: provider.specialization,
                confidence: provider.confidence,
                temperature: provider.temperature as f32,
                max_tokens: provider.max_tokens,
                structured_output: provider.structured_output,
                timeout_seconds: self.orchestrator.timeout_seconds,
            });
        }

        if resolved.is_empty() {
            return Err(ConfigError::NoProvidersAvailable);
        }

        Ok(resolved)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

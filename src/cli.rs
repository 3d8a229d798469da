//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// DealSynth - multi-provider AI consensus for acquisition deals
///
/// Sends one deal to several LLM providers in parallel, parses each
/// answer and combines them into a single weighted recommendation.
///
/// Examples:
///   dealsynth --deal-id 90003
///   dealsynth --deal-id 90003 --deals pipeline.json --format json
///   dealsynth --deal-id 90003 --providers "OpenAI GPT-4,Anthropic Claude Sonnet"
///   dealsynth --deal-id 90003 --dry-run
///   dealsynth --list-providers
///   dealsynth --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Id of the deal to analyze
    #[arg(
        long,
        value_name = "ID",
        required_unless_present_any = ["init_config", "list_providers"]
    )]
    pub deal_id: Option<i64>,

    /// JSON file with deal records
    #[arg(
        long,
        default_value = "deals.json",
        value_name = "FILE",
        env = "DEALSYNTH_DEALS"
    )]
    pub deals: PathBuf,

    /// Path to configuration file
    ///
    /// If not specified, looks for .dealsynth.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "DEALSYNTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Default: from config or deal_analysis.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Per-provider request timeout in seconds
    ///
    /// Default: from config or 30s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries per provider for network errors, timeouts, 429 and 5xx
    #[arg(long, value_name = "N")]
    pub retries: Option<usize>,

    /// Only use these providers (comma-separated names)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub providers: Option<Vec<String>>,

    /// Dry run: print the prompt each provider would receive
    ///
    /// Makes no provider calls.
    #[arg(long)]
    pub dry_run: bool,

    /// Show configured providers and whether their credentials are set
    #[arg(long)]
    pub list_providers: bool,

    /// Generate a default .dealsynth.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref names) = self.providers {
            if names.iter().all(|n| n.trim().is_empty()) {
                return Err("--providers needs at least one provider name".to_string());
            }
        }

        if !self.list_providers && self.deal_id.is_none() {
            return Err("--deal-id is required".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

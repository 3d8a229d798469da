//! DealSynth - multi-provider AI consensus for acquisition deals
//!
//! A CLI tool that sends one deal to several LLM providers in parallel
//! and combines their answers into a single weighted recommendation.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, deal file, no providers, etc.)
//!   2 - Deal not found

mod analysis;
mod cli;
mod config;
mod deals;
mod error;
mod models;
mod provider;
mod report;

use analysis::AnalysisOrchestrator;
use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Availability, Config, DEFAULT_CONFIG_FILE};
use deals::{DealSource, JsonDealStore};
use error::AnalysisError;
use indicatif::{ProgressBar, ProgressStyle};
use models::CombinedAnalysis;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a .env file
    let dotenv = dotenvy::dotenv();

    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args)?;

    info!("DealSynth v{}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    }
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(exit_code_for(&e));
        }
    }
}

/// Map a failure to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AnalysisError>() {
        Some(AnalysisError::DealNotFound { .. }) => 2,
        _ => 1,
    }
}

/// Handle --init-config: generate a default .dealsynth.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize providers, models, timeouts and retries.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` overrides the level chosen by `-v`/`-q`.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the selected command. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    if args.list_providers {
        handle_list_providers(&config);
        return Ok(0);
    }

    let deal_id = args.deal_id.context("--deal-id is required")?;
    let store = JsonDealStore::load(&args.deals)?;
    debug!("{} deals available in {}", store.deals().len(), args.deals.display());

    if args.dry_run {
        return handle_dry_run(&config, &store, deal_id).await;
    }

    // Step 1: Resolve providers
    let settings = config.resolve_providers()?;
    let adapters = provider::build_adapters(&settings)?;
    let orchestrator = AnalysisOrchestrator::new(adapters, &config.orchestrator)?;
    debug!("Dispatch order: {}", orchestrator.provider_names().join(", "));

    println!("🤖 Analyzing deal {} with {} providers...", deal_id, settings.len());
    for provider in &settings {
        println!(
            "   • {} ({}, {})",
            provider.name, provider.model, provider.specialization
        );
    }
    println!(
        "   Timeout: {}s | Retries: {}",
        config.orchestrator.timeout_seconds, config.orchestrator.retries
    );

    // Step 2: Run the providers
    let spinner = analysis_spinner(args.quiet);
    let outcome = orchestrator.run_analysis(&store, deal_id).await;
    spinner.finish_and_clear();
    let analysis = outcome?;

    // Step 3: Generate and save the report
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.general.output));

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&analysis)?,
        OutputFormat::Markdown => report::generate_markdown_report(&analysis),
    };
    report::write_report(&output, &output_path)?;

    print_summary(&analysis, start_time.elapsed());
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    Ok(0)
}

/// Spinner shown while the provider batch is in flight.
fn analysis_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Waiting for provider analyses...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    spinner
}

fn print_summary(analysis: &CombinedAnalysis, duration: Duration) {
    println!("\n📊 Analysis Summary: {}", analysis.deal_name);
    println!("   Overall Score: {:.1}/100", analysis.overall_score);
    println!("   Confidence: {:.0}%", analysis.confidence * 100.0);
    println!(
        "   Consensus: {} {}",
        analysis.consensus.emoji(),
        analysis.consensus
    );

    for result in &analysis.provider_results {
        let marker = if result.is_fallback() { "⚠️ " } else { "" };
        println!(
            "   - {}{}: {}/100, {}",
            marker, result.provider_name, result.score, result.recommendation
        );
    }

    if analysis.fallback_count() > 0 {
        println!(
            "   {} of {} providers were unavailable",
            analysis.fallback_count(),
            analysis.provider_count()
        );
    }
    println!("   Duration: {:.1}s", duration.as_secs_f64());
}

/// Handle --list-providers: show each configured provider and its status.
fn handle_list_providers(config: &Config) {
    println!("🔌 Configured providers:\n");

    for provider in &config.providers {
        let status = match provider.availability(|var| std::env::var(var).ok()) {
            Availability::Available => "✅ available".to_string(),
            Availability::Disabled => "⏸️  disabled".to_string(),
            Availability::MissingCredential(var) => format!("❌ {} not set", var),
        };

        println!("   {} [{}]", provider.name, status);
        println!(
            "     {} | {} | {} | confidence {:.2}",
            provider.kind, provider.model, provider.specialization, provider.confidence
        );
    }
}

/// Handle --dry-run: print the prompt each provider would receive, exit.
async fn handle_dry_run(config: &Config, store: &JsonDealStore, deal_id: i64) -> Result<i32> {
    let deal = store.get_deal(deal_id).await?;

    println!("\n🔍 Dry run for deal {} ({}), no provider calls...\n", deal.id, deal.name);

    for provider in config.providers.iter().filter(|p| p.enabled) {
        let prompt = provider::build_prompt(provider.specialization, &deal, provider.structured_output);

        println!("━━━ {} ({}) ━━━", provider.name, provider.specialization);
        if let Some(ref system) = prompt.system {
            println!("[system]\n{}\n", system);
        }
        println!("[user]\n{}\n", prompt.user);
    }

    println!("✅ Dry run complete. No provider calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let not_found = anyhow::Error::new(AnalysisError::DealNotFound { id: 3 })
            .context("Failed to run analysis");
        assert_eq!(exit_code_for(&not_found), 2);

        let other = anyhow::anyhow!("config broken");
        assert_eq!(exit_code_for(&other), 1);

        let precondition = anyhow::Error::new(AnalysisError::PreconditionViolation(
            "no providers".to_string(),
        ));
        assert_eq!(exit_code_for(&precondition), 1);

        let unreadable = anyhow::Error::new(AnalysisError::DealSource(
            "failed to read deals.json".to_string(),
        ));
        assert_eq!(exit_code_for(&unreadable), 1);
    }
}

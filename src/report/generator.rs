//! Markdown report generation.
//!
//! This module renders a [`CombinedAnalysis`] as a Markdown or JSON
//! document for the deal team.

use crate::analysis::aggregator::vote_counts;
use crate::models::{CombinedAnalysis, ProviderResult, Recommendation};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(analysis: &CombinedAnalysis) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!("# Deal Analysis: {}\n\n", analysis.deal_name));

    output.push_str(&generate_metadata_section(analysis));
    output.push_str(&generate_summary_section(analysis));
    output.push_str(&generate_votes_section(&analysis.provider_results));
    output.push_str(&generate_providers_section(&analysis.provider_results));
    output.push_str(&generate_points_section("Top Strengths", &analysis.top_strengths));
    output.push_str(&generate_points_section("Top Risks", &analysis.top_risks));
    output.push_str(&generate_details_section(&analysis.provider_results));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(analysis: &CombinedAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Deal ID:** {}\n", analysis.deal_id));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        analysis.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Providers:** {}\n", analysis.provider_count()));

    let fallbacks = analysis.fallback_count();
    if fallbacks > 0 {
        section.push_str(&format!("- **Providers Unavailable:** {}\n", fallbacks));
    }
    section.push('\n');

    section
}

/// Generate the headline numbers.
fn generate_summary_section(analysis: &CombinedAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Overall Score | Confidence | Consensus |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| **{:.1}/100** | {:.0}% | {} **{}** |\n\n",
        analysis.overall_score,
        analysis.confidence * 100.0,
        analysis.consensus.emoji(),
        analysis.consensus
    ));
    section.push_str(&analysis.summary);
    section.push_str("\n\n");

    section
}

/// Generate the recommendation vote breakdown.
fn generate_votes_section(results: &[ProviderResult]) -> String {
    let counts = vote_counts(results);
    let mut section = String::new();

    section.push_str("### Recommendation Votes\n\n");
    section.push_str(&format!(
        "| {} Strong Buy | {} Buy | {} Hold | {} Pass |\n",
        Recommendation::StrongBuy.emoji(),
        Recommendation::Buy.emoji(),
        Recommendation::Hold.emoji(),
        Recommendation::Pass.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");

    let cells: Vec<String> = Recommendation::PRECEDENCE
        .iter()
        .map(|rec| counts.get(rec).copied().unwrap_or(0).to_string())
        .collect();
    section.push_str(&format!("| {} |\n\n", cells.join(" | ")));

    section
}

/// Generate the per-provider table.
fn generate_providers_section(results: &[ProviderResult]) -> String {
    let mut section = String::new();

    section.push_str("## Provider Results\n\n");
    section.push_str("| Provider | Score | Confidence | Recommendation | Strengths | Risks | Time |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|---:|\n");

    for result in results {
        let name = if result.is_fallback() {
            format!("{} ⚠️", result.provider_name)
        } else {
            result.provider_name.clone()
        };

        section.push_str(&format!(
            "| {} | {} | {:.0}% | {} | {} | {} | {:.1}s |\n",
            name,
            result.score,
            result.confidence * 100.0,
            result.recommendation,
            result.strengths.len(),
            result.risks.len(),
            result.elapsed_ms as f64 / 1000.0
        ));
    }
    section.push('\n');

    section
}

/// Generate a numbered list section.
fn generate_points_section(title: &str, points: &[String]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));

    if points.is_empty() {
        section.push_str("*None identified.*\n\n");
        return section;
    }

    for (i, point) in points.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, point));
    }
    section.push('\n');

    section
}

/// Generate the raw provider responses, collapsed.
fn generate_details_section(results: &[ProviderResult]) -> String {
    let mut section = String::new();

    section.push_str("## Provider Details\n\n");

    for result in results {
        section.push_str(&format!(
            "### {} {}\n\n",
            result.recommendation.emoji(),
            result.provider_name
        ));
        section.push_str(&format!(
            "**Score:** {}/100 | **Recommendation:** {}\n\n",
            result.score, result.recommendation
        ));
        section.push_str("<details>\n<summary>View Response</summary>\n\n```\n");
        section.push_str(result.reasoning.trim());
        section.push_str("\n```\n</details>\n\n");
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by DealSynth. AI analysis is advisory; verify before committing capital.*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(analysis: &CombinedAnalysis) -> Result<String> {
    serde_json::to_string_pretty(analysis).map_err(Into::into)
}

/// Write already rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

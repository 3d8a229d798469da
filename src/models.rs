//! Data models for deal analysis.
//!
//! This module contains the core data structures passed between the
//! deal source, the provider adapters, the aggregator and the report
//! generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The acquisition target being analyzed.
///
/// Records come from the external deal-management store and use its
/// camelCase field names. Only `id` and `name` are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealInput {
    /// Store identifier.
    pub id: i64,
    /// Business or property name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Asking price in dollars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Annual revenue in dollars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    /// Annual cash flow in dollars.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_flow: Option<f64>,
    /// Seller's discretionary earnings margin as a fraction (0.0 - 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sde_margin: Option<f64>,
    /// AI optimization potential score (0 - 100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_potential: Option<u8>,
    /// Certification advantage score (0 - 100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_advantage: Option<u8>,
    /// Whether the deal sits in an Opportunity Zone.
    #[serde(default)]
    pub opportunity_zone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Pipeline stage (e.g. `due_diligence`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl DealInput {
    /// Creates a deal with only the required fields set.
    #[cfg(test)]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            industry: None,
            location: None,
            price: None,
            revenue: None,
            cash_flow: None,
            sde_margin: None,
            ai_potential: None,
            cert_advantage: None,
            opportunity_zone: false,
            description: None,
            notes: None,
            stage: None,
        }
    }
}

/// Acquisition recommendation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Pass,
}

impl Recommendation {
    /// Tie-break order for consensus voting, strongest first.
    pub const PRECEDENCE: [Recommendation; 4] = [
        Recommendation::StrongBuy,
        Recommendation::Buy,
        Recommendation::Hold,
        Recommendation::Pass,
    ];

    /// Wire token as providers are asked to emit it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "strong_buy",
            Recommendation::Buy => "buy",
            Recommendation::Hold => "hold",
            Recommendation::Pass => "pass",
        }
    }

    /// Parse a literal token, case-insensitively.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::PRECEDENCE
            .into_iter()
            .find(|rec| rec.as_str().eq_ignore_ascii_case(token))
    }

    /// Returns an emoji representation of the recommendation.
    pub fn emoji(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "🟢",
            Recommendation::Buy => "🔵",
            Recommendation::Hold => "🟡",
            Recommendation::Pass => "🔴",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::StrongBuy => write!(f, "STRONG BUY"),
            Recommendation::Buy => write!(f, "BUY"),
            Recommendation::Hold => write!(f, "HOLD"),
            Recommendation::Pass => write!(f, "PASS"),
        }
    }
}

/// How a provider result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    /// The provider answered and its text was parsed.
    Completed,
    /// The provider failed and the fallback result was substituted.
    Fallback,
}

/// One provider's judgment of a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    /// Display name of the model/service.
    pub provider_name: String,
    /// Score from 0 to 100.
    pub score: u8,
    /// Configured reliability weight (0.0 - 1.0).
    pub confidence: f64,
    /// Full raw response text, kept for audit.
    pub reasoning: String,
    /// Up to five strengths, in response order.
    pub strengths: Vec<String>,
    /// Up to five risks, in response order.
    pub risks: Vec<String>,
    pub recommendation: Recommendation,
    pub status: ProviderStatus,
    /// Wall time spent on the provider call, including retries.
    pub elapsed_ms: u64,
}

impl ProviderResult {
    /// Whether this result was substituted by the fallback policy.
    pub fn is_fallback(&self) -> bool {
        self.status == ProviderStatus::Fallback
    }
}

/// The single aggregated output for one deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedAnalysis {
    pub deal_id: i64,
    pub deal_name: String,
    /// Confidence-weighted mean of all provider scores.
    pub overall_score: f64,
    /// Unweighted mean of all provider confidences.
    pub confidence: f64,
    /// Majority-vote recommendation.
    pub consensus: Recommendation,
    /// One result per configured provider, in configured order.
    pub provider_results: Vec<ProviderResult>,
    pub summary: String,
    pub top_strengths: Vec<String>,
    pub top_risks: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl CombinedAnalysis {
    /// Number of providers that contributed (including fallbacks).
    pub fn provider_count(&self) -> usize {
        self.provider_results.len()
    }

    /// Number of providers whose result is a fallback.
    pub fn fallback_count(&self) -> usize {
        self.provider_results
            .iter()
            .filter(|r| r.is_fallback())
            .count()
    }
}

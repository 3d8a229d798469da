//! Neutral substitute for a failed provider call.

use crate::error::AdapterError;
use crate::models::{ProviderResult, ProviderStatus, Recommendation};

/// Score assigned to a provider that produced no analysis.
pub const FALLBACK_SCORE: u8 = 70;

/// Confidence assigned to a provider that produced no analysis.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Build the result recorded when `provider_name` failed with `cause`.
pub fn fallback_result(provider_name: &str, cause: &AdapterError, elapsed_ms: u64) -> ProviderResult {
    let cause = cause.to_string();

    ProviderResult {
        provider_name: provider_name.to_string(),
        score: FALLBACK_SCORE,
        confidence: FALLBACK_CONFIDENCE,
        reasoning: format!("Analysis unavailable - {}", cause),
        strengths: Vec::new(),
        risks: vec![cause],
        recommendation: Recommendation::Hold,
        status: ProviderStatus::Fallback,
        elapsed_ms,
    }
}

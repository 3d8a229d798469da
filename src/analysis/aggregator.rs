//! Combination of per-provider results into one analysis.
//!
//! This module provides the weighted scoring, consensus voting and
//! frequency ranking used to build a [`CombinedAnalysis`].

use crate::error::AnalysisError;
use crate::models::{CombinedAnalysis, DealInput, ProviderResult, Recommendation};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;

/// How many strengths/risks the combined analysis keeps.
pub const TOP_POINTS: usize = 5;

/// Combine provider results, stamping the current time.
pub fn combine(
    deal: &DealInput,
    results: Vec<ProviderResult>,
) -> Result<CombinedAnalysis, AnalysisError> {
    combine_at(deal, results, Utc::now())
}

/// Combine provider results with a caller-supplied timestamp.
///
/// Fails only when `results` is empty or the confidences do not sum to a
/// positive number.
pub fn combine_at(
    deal: &DealInput,
    results: Vec<ProviderResult>,
    timestamp: DateTime<Utc>,
) -> Result<CombinedAnalysis, AnalysisError> {
    if results.is_empty() {
        return Err(AnalysisError::PreconditionViolation(
            "no provider results to combine".to_string(),
        ));
    }

    let total_confidence: f64 = results.iter().map(|r| r.confidence).sum();
    if !total_confidence.is_finite() || total_confidence <= 0.0 {
        return Err(AnalysisError::PreconditionViolation(format!(
            "provider confidences must sum to a positive number, got {}",
            total_confidence
        )));
    }

    let overall_score = results
        .iter()
        .map(|r| f64::from(r.score) * r.confidence)
        .sum::<f64>()
        / total_confidence;
    let confidence = mean_confidence(&results);
    let consensus = consensus(&results);

    let top_strengths = top_by_frequency(results.iter().flat_map(|r| r.strengths.iter()), TOP_POINTS);
    let top_risks = top_by_frequency(results.iter().flat_map(|r| r.risks.iter()), TOP_POINTS);

    let fallbacks = results.iter().filter(|r| r.is_fallback()).count();
    let summary = summary_text(overall_score, confidence, consensus, results.len(), fallbacks);

    Ok(CombinedAnalysis {
        deal_id: deal.id,
        deal_name: deal.name.clone(),
        overall_score,
        confidence,
        consensus,
        provider_results: results,
        summary,
        top_strengths,
        top_risks,
        timestamp,
    })
}

/// Unweighted mean of provider confidences; 0.0 for no results.
pub fn mean_confidence(results: &[ProviderResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }

    results.iter().map(|r| r.confidence).sum::<f64>() / results.len() as f64
}

/// Count recommendation votes.
pub fn vote_counts(results: &[ProviderResult]) -> HashMap<Recommendation, usize> {
    let mut counts: HashMap<Recommendation, usize> = HashMap::new();

    for result in results {
        *counts.entry(result.recommendation).or_default() += 1;
    }

    counts
}

/// Recommendation with the most votes.
///
/// Ties go to the stronger recommendation (`strong_buy` before `buy` before
/// `hold` before `pass`). No results yields `hold`.
pub fn consensus(results: &[ProviderResult]) -> Recommendation {
    let counts = vote_counts(results);
    let mut best = Recommendation::Hold;
    let mut best_count = 0;

    for candidate in Recommendation::PRECEDENCE {
        let count = counts.get(&candidate).copied().unwrap_or(0);
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }

    best
}

/// The `n` most frequent strings, ties broken by first occurrence.
pub fn top_by_frequency<'a>(items: impl IntoIterator<Item = &'a String>, n: usize) -> Vec<String> {
    // text -> (count, first seen position)
    let mut seen: HashMap<&'a str, (usize, usize)> = HashMap::new();

    for (position, item) in items.into_iter().enumerate() {
        seen.entry(item.as_str())
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }

    let mut ranked: Vec<(&str, usize, usize)> = seen
        .into_iter()
        .map(|(text, (count, first))| (text, count, first))
        .collect();
    ranked.sort_by_key(|(_, count, first)| (Reverse(*count), *first));

    ranked
        .into_iter()
        .take(n)
        .map(|(text, _, _)| text.to_string())
        .collect()
}

/// Deterministic one-paragraph summary.
pub fn summary_text(
    overall_score: f64,
    confidence: f64,
    consensus: Recommendation,
    provider_count: usize,
    fallback_count: usize,
) -> String {
    let mut summary = format!(
        "Based on analysis from {} AI {}, this deal scores {:.1}/100 with {:.0}% confidence. \
         The consensus recommendation is {}.",
        provider_count,
        if provider_count == 1 { "model" } else { "models" },
        overall_score,
        confidence * 100.0,
        consensus,
    );

    if fallback_count > 0 {
        summary.push_str(&format!(
            " {} of {} providers were unavailable and contributed neutral defaults.",
            fallback_count, provider_count
        ));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fallback::fallback_result;
    use crate::error::AdapterError;
    use crate::models::ProviderStatus;
    use chrono::TimeZone;

    fn create_test_result(
        name: &str,
        score: u8,
        confidence: f64,
        recommendation: Recommendation,
    ) -> ProviderResult {
        ProviderResult {
            provider_name: name.to_string(),
            score,
            confidence,
            reasoning: format!("Score: {}", score),
            strengths: Vec::new(),
            risks: Vec::new(),
            recommendation,
            status: ProviderStatus::Completed,
            elapsed_ms: 0,
        }
    }

    fn scenario_a() -> Vec<ProviderResult> {
        vec![
            create_test_result("Perplexity", 80, 0.85, Recommendation::Buy),
            create_test_result("GPT-4", 85, 0.93, Recommendation::Buy),
            create_test_result("Gemini", 90, 0.9, Recommendation::StrongBuy),
            create_test_result("Grok", 70, 0.88, Recommendation::Hold),
            create_test_result("Claude", 75, 0.92, Recommendation::Hold),
        ]
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_weighted_score_scenario() {
        let deal = DealInput::new(90003, "Ponce Protocol");
        let combined = combine_at(&deal, scenario_a(), fixed_time()).unwrap();

        // 358.65 / 4.48
        assert!((combined.overall_score - 80.0558).abs() < 0.01);
        assert!((combined.confidence - 0.896).abs() < 1e-9);
        assert_eq!(combined.deal_id, 90003);
        assert_eq!(combined.deal_name, "Ponce Protocol");
        assert_eq!(combined.provider_count(), 5);
    }

    /// Two completed providers, one fallback.
    fn mixed_with_fallback() -> Vec<ProviderResult> {
        let cause = AdapterError::Timeout { seconds: 30 };
        vec![
            create_test_result("GPT-4", 95, 0.93, Recommendation::StrongBuy),
            fallback_result("Grok", &cause, 30_000),
            create_test_result("Claude", 40, 0.92, Recommendation::Pass),
        ]
    }

    /// One provider carries no weight at all.
    fn with_zero_confidence() -> Vec<ProviderResult> {
        vec![
            create_test_result("Gemini", 88, 0.9, Recommendation::Buy),
            create_test_result("Local", 5, 0.0, Recommendation::Pass),
            create_test_result("Claude", 62, 0.4, Recommendation::Hold),
        ]
    }

    fn input_sets() -> Vec<Vec<ProviderResult>> {
        vec![scenario_a(), mixed_with_fallback(), with_zero_confidence()]
    }

    #[test]
    fn test_score_within_bounds() {
        for results in input_sets() {
            let min = results.iter().map(|r| r.score).min().unwrap() as f64;
            let max = results.iter().map(|r| r.score).max().unwrap() as f64;

            let combined = combine_at(&DealInput::new(1, "X"), results, fixed_time()).unwrap();
            assert!(
                combined.overall_score >= min && combined.overall_score <= max,
                "{} outside [{}, {}]",
                combined.overall_score,
                min,
                max
            );
        }
    }

    #[test]
    fn test_zero_confidence_provider_has_no_weight() {
        let combined =
            combine_at(&DealInput::new(1, "X"), with_zero_confidence(), fixed_time()).unwrap();

        // (88 * 0.9 + 62 * 0.4) / 1.3
        assert!((combined.overall_score - 80.0).abs() < 1e-9);
        assert!((combined.confidence - 1.3 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_permutation_invariance() {
        let deal = DealInput::new(1, "X");

        for results in input_sets() {
            let forward = combine_at(&deal, results.clone(), fixed_time()).unwrap();

            let mut reversed_results = results.clone();
            reversed_results.reverse();
            let mut rotated_results = results;
            rotated_results.rotate_left(1);

            for permuted in [reversed_results, rotated_results] {
                let other = combine_at(&deal, permuted, fixed_time()).unwrap();
                assert!((forward.overall_score - other.overall_score).abs() < 1e-9);
                assert!((forward.confidence - other.confidence).abs() < 1e-9);
                assert_eq!(forward.consensus, other.consensus);
            }
        }
    }

    #[test]
    fn test_majority_vote() {
        let results = vec![
            create_test_result("a", 80, 0.9, Recommendation::Buy),
            create_test_result("b", 80, 0.9, Recommendation::Hold),
            create_test_result("c", 80, 0.9, Recommendation::Buy),
            create_test_result("d", 80, 0.9, Recommendation::Hold),
            create_test_result("e", 80, 0.9, Recommendation::Buy),
        ];

        assert_eq!(consensus(&results), Recommendation::Buy);
        assert_eq!(vote_counts(&results).get(&Recommendation::Hold), Some(&2));
    }

    #[test]
    fn test_tie_goes_to_precedence() {
        // Scenario A is a 2/2/1 split between buy and hold.
        assert_eq!(consensus(&scenario_a()), Recommendation::Buy);

        let results = vec![
            create_test_result("a", 50, 0.9, Recommendation::Pass),
            create_test_result("b", 50, 0.9, Recommendation::Hold),
        ];
        assert_eq!(consensus(&results), Recommendation::Hold);

        let results = vec![
            create_test_result("a", 50, 0.9, Recommendation::Buy),
            create_test_result("b", 50, 0.9, Recommendation::StrongBuy),
        ];
        assert_eq!(consensus(&results), Recommendation::StrongBuy);
    }

    #[test]
    fn test_idempotent_with_fixed_timestamp() {
        let deal = DealInput::new(7, "Laundromat");
        let first = combine_at(&deal, scenario_a(), fixed_time()).unwrap();
        let second = combine_at(&deal, scenario_a(), fixed_time()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_all_fallbacks() {
        let cause = AdapterError::Network("connection refused".to_string());
        let results: Vec<_> = (0..5)
            .map(|i| fallback_result(&format!("provider-{}", i), &cause, 0))
            .collect();

        let combined = combine_at(&DealInput::new(1, "X"), results, fixed_time()).unwrap();

        assert_eq!(combined.overall_score, 70.0);
        assert_eq!(combined.confidence, 0.5);
        assert_eq!(combined.consensus, Recommendation::Hold);
        assert_eq!(combined.fallback_count(), 5);
        assert_eq!(combined.top_risks, vec!["network error: connection refused"]);
        assert!(combined.summary.contains("5 of 5 providers were unavailable"));
    }

    #[test]
    fn test_rejects_empty_results() {
        let err = combine_at(&DealInput::new(1, "X"), Vec::new(), fixed_time()).unwrap_err();
        assert!(matches!(err, AnalysisError::PreconditionViolation(_)));
    }

    #[test]
    fn test_rejects_zero_confidence() {
        let results = vec![
            create_test_result("a", 80, 0.0, Recommendation::Buy),
            create_test_result("b", 60, 0.0, Recommendation::Hold),
        ];

        let err = combine_at(&DealInput::new(1, "X"), results, fixed_time()).unwrap_err();
        assert!(matches!(err, AnalysisError::PreconditionViolation(_)));
    }

    #[test]
    fn test_top_by_frequency() {
        let items: Vec<String> = ["b", "a", "c", "a", "d", "b", "e", "f", "a"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        // a:3, b:2, then c/d/e/f by first occurrence
        assert_eq!(
            top_by_frequency(items.iter(), TOP_POINTS),
            vec!["a", "b", "c", "d", "e"]
        );
    }

    #[test]
    fn test_top_strengths_across_providers() {
        let mut first = create_test_result("a", 80, 0.9, Recommendation::Buy);
        first.strengths = vec!["Prime location downtown".to_string(), "Recurring revenue".to_string()];
        let mut second = create_test_result("b", 80, 0.9, Recommendation::Buy);
        second.strengths = vec!["Recurring revenue".to_string()];

        let combined = combine_at(&DealInput::new(1, "X"), vec![first, second], fixed_time()).unwrap();

        assert_eq!(
            combined.top_strengths,
            vec!["Recurring revenue", "Prime location downtown"]
        );
        assert!(combined.top_risks.is_empty());
    }

    #[test]
    fn test_summary_text() {
        let summary = summary_text(80.0558, 0.896, Recommendation::Buy, 5, 0);
        assert_eq!(
            summary,
            "Based on analysis from 5 AI models, this deal scores 80.1/100 with 90% confidence. \
             The consensus recommendation is BUY."
        );
    }
}

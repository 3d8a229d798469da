//! Concurrent fan-out of one deal to every configured provider.
//!
//! A run never fails because a provider failed: each adapter call is
//! bounded by a timeout, optionally retried, and replaced by the fallback
//! result when it still errors. Only an empty provider set, a missing deal
//! or an aggregation precondition surface as [`AnalysisError`].

use super::aggregator::combine;
use super::fallback::fallback_result;
use super::parser::parse_response;
use crate::config::OrchestratorConfig;
use crate::deals::DealSource;
use crate::error::{AdapterError, AnalysisError};
use crate::models::{CombinedAnalysis, DealInput, ProviderResult};
use crate::provider::ProviderAdapter;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

/// Longest pause between two attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Runs the analysis pipeline for one deal at a time.
pub struct AnalysisOrchestrator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    timeout: Duration,
    retries: usize,
    retry_base_delay: Duration,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator over `adapters`, in the given order.
    pub fn new(
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        config: &OrchestratorConfig,
    ) -> Result<Self, AnalysisError> {
        if adapters.is_empty() {
            return Err(AnalysisError::PreconditionViolation(
                "at least one provider adapter is required".to_string(),
            ));
        }

        Ok(Self {
            adapters,
            timeout: Duration::from_secs(config.timeout_seconds),
            retries: config.retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    /// Override the per-attempt timeout.
    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry policy.
    #[cfg(test)]
    pub fn with_retries(mut self, retries: usize, base_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Names of the providers in dispatch order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Fetch a deal from `source` and analyze it.
    pub async fn run_analysis(
        &self,
        source: &dyn DealSource,
        deal_id: i64,
    ) -> Result<CombinedAnalysis, AnalysisError> {
        let deal = source.get_deal(deal_id).await?;
        self.analyze_deal(&deal).await
    }

    /// Analyze a deal that is already in hand.
    pub async fn analyze_deal(&self, deal: &DealInput) -> Result<CombinedAnalysis, AnalysisError> {
        info!(
            "Analyzing deal {} ({}) with {} providers",
            deal.id,
            deal.name,
            self.adapters.len()
        );

        let results = self.collect_results(deal).await;
        let combined = combine(deal, results)?;

        info!(
            "Deal {} scored {:.1}/100, consensus {} ({} of {} providers fell back)",
            deal.id,
            combined.overall_score,
            combined.consensus,
            combined.fallback_count(),
            combined.provider_count()
        );

        Ok(combined)
    }

    /// One result per adapter, in configured order.
    pub async fn collect_results(&self, deal: &DealInput) -> Vec<ProviderResult> {
        let calls = self
            .adapters
            .iter()
            .map(|adapter| self.run_adapter(adapter.as_ref(), deal));

        join_all(calls).await
    }

    async fn run_adapter(&self, adapter: &dyn ProviderAdapter, deal: &DealInput) -> ProviderResult {
        debug!("Dispatching deal {} to {}", deal.id, adapter.name());

        let started = Instant::now();
        let outcome = self.call_with_retry(adapter, deal).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(text) => {
                info!("✓ {} completed in {}ms", adapter.name(), elapsed_ms);
                parse_response(&text).into_result(adapter.name(), adapter.confidence(), text, elapsed_ms)
            }
            Err(e) => {
                warn!(
                    "✗ {} failed after {}ms: {}; using fallback result",
                    adapter.name(),
                    elapsed_ms,
                    e
                );
                fallback_result(adapter.name(), &e, elapsed_ms)
            }
        }
    }

    async fn call_with_retry(
        &self,
        adapter: &dyn ProviderAdapter,
        deal: &DealInput,
    ) -> Result<String, AdapterError> {
        let limit = self.timeout;

        RetryIf::start(
            self.retry_strategy(),
            || call_with_timeout(adapter, deal, limit),
            |e: &AdapterError| {
                let retry = e.is_retryable();
                if retry && self.retries > 0 {
                    warn!("{} attempt failed: {}", adapter.name(), e);
                }
                retry
            },
        )
        .await
    }

    /// Delays between attempts: `base`, `2*base`, `4*base`... capped and
    /// jittered. Empty when retries are off.
    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        // `from_millis(2)` doubles each step; the factor scales it to the base.
        let factor = self.retry_base_delay.as_millis() as u64 / 2;

        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(MAX_RETRY_DELAY)
            .map(jitter)
            .take(self.retries)
    }
}

async fn call_with_timeout(
    adapter: &dyn ProviderAdapter,
    deal: &DealInput,
    limit: Duration,
) -> Result<String, AdapterError> {
    match timeout(limit, adapter.analyze(deal)).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout {
            seconds: limit.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deals::JsonDealStore;
    use crate::models::Recommendation;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Respond(String),
        Fail(AdapterError),
        Hang,
        /// Fail this many times, then respond.
        Flaky(usize, AdapterError, String),
    }

    struct MockAdapter {
        name: String,
        confidence: f64,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockAdapter {
        fn new(name: &str, confidence: f64, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                confidence,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn responding(name: &str, confidence: f64, text: &str) -> Arc<Self> {
            Self::new(name, confidence, Behavior::Respond(text.to_string()))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn confidence(&self) -> f64 {
            self.confidence
        }

        async fn analyze(&self, _deal: &DealInput) -> Result<String, AdapterError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);

            match &self.behavior {
                Behavior::Respond(text) => Ok(text.clone()),
                Behavior::Fail(e) => Err(e.clone()),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("Score: 99".to_string())
                }
                Behavior::Flaky(failures, e, text) => {
                    if call < *failures {
                        Err(e.clone())
                    } else {
                        Ok(text.clone())
                    }
                }
            }
        }
    }

    fn response(score: u8, recommendation: &str) -> String {
        format!(
            "Score: {}\n\nStrengths:\n- Stable cash flow for a decade\n\nRisks:\n- Lease renewal due next year\n\nRecommendation: {}",
            score, recommendation
        )
    }

    fn orchestrator(adapters: Vec<Arc<dyn ProviderAdapter>>) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(adapters, &OrchestratorConfig::default())
            .unwrap()
            .with_timeout(Duration::from_millis(50))
    }

    fn deal() -> DealInput {
        DealInput::new(90003, "Ponce Protocol")
    }

    #[test]
    fn test_requires_adapters() {
        let result = AnalysisOrchestrator::new(Vec::new(), &OrchestratorConfig::default());
        assert!(matches!(result, Err(AnalysisError::PreconditionViolation(_))));
    }

    #[test]
    fn test_retry_strategy_delays() {
        let adapter: Arc<dyn ProviderAdapter> = MockAdapter::responding("a", 0.9, "");
        let orchestrator = orchestrator(vec![adapter])
            .with_retries(3, Duration::from_millis(500));

        let delays: Vec<Duration> = orchestrator.retry_strategy().collect();
        assert_eq!(delays.len(), 3);
        // Jitter only ever shortens a delay.
        assert!(delays[0] <= Duration::from_millis(500));
        assert!(delays[1] <= Duration::from_millis(1000));
        assert!(delays[2] <= Duration::from_millis(2000));

        let none = orchestrator.with_retries(0, Duration::from_millis(500));
        assert_eq!(none.retry_strategy().count(), 0);
    }

    #[tokio::test]
    async fn test_weighted_combination() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            MockAdapter::responding("Perplexity", 0.85, &response(80, "buy")),
            MockAdapter::responding("GPT-4", 0.93, &response(85, "buy")),
            MockAdapter::responding("Gemini", 0.9, &response(90, "strong_buy")),
            MockAdapter::responding("Grok", 0.88, &response(70, "hold")),
            MockAdapter::responding("Claude", 0.92, &response(75, "hold")),
        ];

        let combined = orchestrator(adapters).analyze_deal(&deal()).await.unwrap();

        assert!((combined.overall_score - 80.0558).abs() < 0.01);
        assert!((combined.confidence - 0.896).abs() < 1e-9);
        assert_eq!(combined.consensus, Recommendation::Buy);
        assert_eq!(combined.top_strengths, vec!["Stable cash flow for a decade"]);
        assert_eq!(combined.fallback_count(), 0);
    }

    #[tokio::test]
    async fn test_majority_buy() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = ["buy", "hold", "buy", "hold", "buy"]
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                MockAdapter::responding(&format!("p{}", i), 0.9, &response(75, rec))
                    as Arc<dyn ProviderAdapter>
            })
            .collect();

        let combined = orchestrator(adapters).analyze_deal(&deal()).await.unwrap();
        assert_eq!(combined.consensus, Recommendation::Buy);
    }

    #[tokio::test]
    async fn test_timeouts_fall_back() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            MockAdapter::responding("p0", 0.85, &response(80, "buy")),
            MockAdapter::new("p1", 0.93, Behavior::Hang),
            MockAdapter::responding("p2", 0.9, &response(90, "buy")),
            MockAdapter::new("p3", 0.88, Behavior::Hang),
            MockAdapter::responding("p4", 0.92, &response(75, "hold")),
        ];

        let combined = orchestrator(adapters).analyze_deal(&deal()).await.unwrap();
        let results = &combined.provider_results;

        assert_eq!(results.len(), 5);
        for index in [1, 3] {
            assert!(results[index].is_fallback());
            assert_eq!(results[index].confidence, 0.5);
            assert_eq!(results[index].score, 70);
            assert!(results[index].risks[0].contains("timed out"));
        }
        assert_eq!(combined.fallback_count(), 2);
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = (0..5)
            .map(|i| {
                MockAdapter::new(
                    &format!("p{}", i),
                    0.9,
                    Behavior::Fail(AdapterError::status(500, "upstream error")),
                ) as Arc<dyn ProviderAdapter>
            })
            .collect();

        let combined = orchestrator(adapters).analyze_deal(&deal()).await.unwrap();

        assert_eq!(combined.overall_score, 70.0);
        assert_eq!(combined.confidence, 0.5);
        assert_eq!(combined.consensus, Recommendation::Hold);
    }

    #[tokio::test]
    async fn test_results_keep_configured_order() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            MockAdapter::new("slow", 0.9, Behavior::Hang),
            MockAdapter::responding("fast", 0.9, &response(60, "pass")),
        ];

        let results = orchestrator(adapters).collect_results(&deal()).await;

        assert_eq!(results[0].provider_name, "slow");
        assert_eq!(results[1].provider_name, "fast");
        assert_eq!(results[1].score, 60);
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let flaky = MockAdapter::new(
            "flaky",
            0.9,
            Behavior::Flaky(
                2,
                AdapterError::Network("connection reset".to_string()),
                response(88, "strong_buy"),
            ),
        );
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![flaky.clone()];

        let results = orchestrator(adapters)
            .with_retries(2, Duration::from_millis(0))
            .collect_results(&deal())
            .await;

        assert_eq!(flaky.calls(), 3);
        assert!(!results[0].is_fallback());
        assert_eq!(results[0].score, 88);
    }

    #[tokio::test]
    async fn test_no_retry_on_client_error() {
        let failing = MockAdapter::new(
            "bad-key",
            0.9,
            Behavior::Fail(AdapterError::status(401, "invalid api key")),
        );
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![failing.clone()];

        let results = orchestrator(adapters)
            .with_retries(3, Duration::from_millis(0))
            .collect_results(&deal())
            .await;

        assert_eq!(failing.calls(), 1);
        assert!(results[0].is_fallback());
        assert_eq!(results[0].risks, vec!["HTTP 401: invalid api key"]);
    }

    #[tokio::test]
    async fn test_run_analysis_unknown_deal() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> =
            vec![MockAdapter::responding("p", 0.9, &response(80, "buy"))];
        let store = JsonDealStore::from_deals(vec![deal()]);
        let orchestrator = orchestrator(adapters);

        let found = orchestrator.run_analysis(&store, 90003).await;
        tokio_test::assert_ok!(&found);

        let missing = orchestrator.run_analysis(&store, 1).await;
        tokio_test::assert_err!(&missing);
        assert!(matches!(missing, Err(AnalysisError::DealNotFound { id: 1 })));
    }

    #[test]
    fn test_provider_names() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            MockAdapter::responding("first", 0.9, ""),
            MockAdapter::responding("second", 0.8, ""),
        ];

        let orchestrator = orchestrator(adapters);
        assert_eq!(orchestrator.provider_names(), vec!["first", "second"]);

        let results = tokio_test::block_on(orchestrator.collect_results(&deal()));
        // Empty text parses to defaults rather than falling back.
        assert_eq!(results[0].score, 75);
        assert!(!results[0].is_fallback());
    }
}

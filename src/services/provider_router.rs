//! Provider fallback router (spec §4.1 / C1).
//!
//! Tries providers in an order chosen by the configured selection
//! strategy, consulting the circuit breaker before each attempt and
//! validating every response before accepting it. Grounded on the
//! teacher's `adapters::substrates::registry` provider-lookup pattern and
//! its `backoff` dependency for per-attempt retry pacing (this module is
//! the first to put that dependency to real use; the teacher's own retry
//! loops hand-roll `2^n`).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::RwLock;

use crate::domain::errors::{AttemptOutcome, KernelError, KernelResult, ProviderAttempt};
use crate::domain::models::health::ProviderHealth;
use crate::domain::models::ProviderRecord;
use crate::domain::ports::provider_adapter::{
    NormalizedRequest, NormalizedResponse, ProviderAdapterError, ProviderAdapterFactory,
};
use crate::services::circuit_breaker::CircuitBreakerService;
use crate::services::observability::MetricsRegistry;

/// How candidate providers are ordered before fallback begins (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    PriorityOrder,
    Fastest,
    CostOptimized,
    RoundRobin,
    CapabilityMatch,
}

/// Observed per-provider latency, used by `Fastest`. Populated by the
/// router itself from attempt durations; no external telemetry dependency.
#[derive(Default)]
struct LatencyStats {
    observed_ms: std::collections::HashMap<String, u64>,
}

impl LatencyStats {
    fn record(&mut self, provider_id: &str, duration_ms: u64) {
        self.observed_ms.insert(provider_id.to_string(), duration_ms);
    }

    fn expected_ms(&self, provider_id: &str) -> u64 {
        self.observed_ms.get(provider_id).copied().unwrap_or(u64::MAX)
    }
}

/// Config for fake-response fingerprint rejection (spec §4.1 "bulletproof"
/// response validation) and retry pacing.
#[derive(Debug, Clone)]
pub struct ProviderRouterConfig {
    pub fake_response_fingerprints: Vec<String>,
    pub retry_initial_interval: Duration,
    pub retry_max_interval: Duration,
}

impl Default for ProviderRouterConfig {
    fn default() -> Self {
        Self {
            fake_response_fingerprints: vec![
                "as an ai language model".to_string(),
                "i cannot assist with that".to_string(),
            ],
            retry_initial_interval: Duration::from_millis(200),
            retry_max_interval: Duration::from_secs(5),
        }
    }
}

/// A successful response plus the provider that produced it, so callers
/// can attribute actual cost via `ProviderRecord::expected_cost_usd`
/// without the router re-deriving pricing from a model-name table (spec
/// §4.12 debits the exact per-provider per-token rate).
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    pub response: NormalizedResponse,
    pub provider_id: String,
    pub cost_usd: f64,
}

/// Routes a normalized request across the configured provider pool,
/// falling back on transient failures and tracking attempts for the
/// final `NoProviderAvailable` error (spec §7).
pub struct ProviderRouter {
    providers: Vec<ProviderRecord>,
    factory: Arc<dyn ProviderAdapterFactory>,
    breaker: Arc<CircuitBreakerService>,
    config: ProviderRouterConfig,
    latency: tokio::sync::Mutex<LatencyStats>,
    round_robin_cursor: std::sync::atomic::AtomicUsize,
    health: RwLock<HashMap<String, ProviderHealth>>,
    metrics: Arc<MetricsRegistry>,
}

impl ProviderRouter {
    pub fn new(
        providers: Vec<ProviderRecord>,
        factory: Arc<dyn ProviderAdapterFactory>,
        breaker: Arc<CircuitBreakerService>,
        config: ProviderRouterConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let health = providers.iter().map(|p| (p.provider_id.clone(), ProviderHealth::new(p.provider_id.clone()))).collect();
        Self {
            providers,
            factory,
            breaker,
            config,
            latency: tokio::sync::Mutex::new(LatencyStats::default()),
            round_robin_cursor: std::sync::atomic::AtomicUsize::new(0),
            health: RwLock::new(health),
            metrics,
        }
    }

    /// Permanently disable a provider (401/403) or mark it rate-limited
    /// (429) for this process. Mirrors the corresponding breaker mutation
    /// done by `record_failure`, but these outcomes are never retried.
    async fn mark_unavailable(&self, provider_id: &str, outcome: &ProviderAdapterError) {
        let mut health = self.health.write().await;
        let entry = health.entry(provider_id.to_string()).or_insert_with(|| ProviderHealth::new(provider_id));
        match outcome {
            ProviderAdapterError::Auth => entry.disabled = true,
            ProviderAdapterError::Rate { retry_after } => {
                entry.rate_limit_until = Some(Instant::now() + *retry_after);
            }
            _ => {}
        }
    }

    /// Feed one attempt outcome to the breaker and record a metrics
    /// transition if the breaker's state actually changed as a result
    /// (spec §6 "counters... for circuit-breaker transitions").
    async fn record_breaker_outcome(&self, provider_id: &str, succeeded: bool) {
        let before = self.breaker.state(provider_id).await;
        if succeeded {
            self.breaker.record_success(provider_id).await;
        } else {
            self.breaker.record_failure(provider_id).await;
        }
        let after = self.breaker.state(provider_id).await;
        if before != after {
            self.metrics.record_breaker_transition(provider_id).await;
        }
    }

    /// Re-enable a provider disabled by a prior 401/403, for the admin
    /// reset path named in spec §4.1.
    pub async fn reset_provider(&self, provider_id: &str) {
        if let Some(entry) = self.health.write().await.get_mut(provider_id) {
            entry.disabled = false;
            entry.rate_limit_until = None;
        }
    }

    async fn ordered_candidates(&self, strategy: SelectionStrategy, capability_hint: Option<&str>) -> Vec<&ProviderRecord> {
        let now = Instant::now();
        let health = self.health.read().await;
        let mut candidates: Vec<&ProviderRecord> = self
            .providers
            .iter()
            .filter(|p| p.enabled && p.matches_capability(capability_hint))
            .filter(|p| health.get(&p.provider_id).map(|h| h.is_available(now)).unwrap_or(true))
            .collect();
        drop(health);

        match strategy {
            SelectionStrategy::PriorityOrder | SelectionStrategy::CapabilityMatch => {
                candidates.sort_by_key(|p| p.priority);
            }
            SelectionStrategy::CostOptimized => {
                candidates.sort_by(|a, b| {
                    a.cost_per_input_token_usd
                        .partial_cmp(&b.cost_per_input_token_usd)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            SelectionStrategy::Fastest => {
                let latency = self.latency.lock().await;
                candidates.sort_by_key(|p| latency.expected_ms(&p.provider_id));
            }
            SelectionStrategy::RoundRobin => {
                if !candidates.is_empty() {
                    let cursor = self.round_robin_cursor.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    candidates.rotate_left(cursor % candidates.len());
                }
            }
        }

        candidates
    }

    /// Reject template/empty/schema-invalid responses before they reach the
    /// caller (spec §4.1 "bulletproof response validation").
    fn validate_response(&self, response: &NormalizedResponse) -> Result<(), String> {
        if response.content.trim().is_empty() {
            return Err("empty response content".to_string());
        }
        let lowered = response.content.to_ascii_lowercase();
        for fingerprint in &self.config.fake_response_fingerprints {
            if lowered.contains(&fingerprint.to_ascii_lowercase()) {
                return Err(format!("response matched fake-response fingerprint '{fingerprint}'"));
            }
        }
        Ok(())
    }

    /// Attempt the request against providers in strategy order, falling
    /// back on any transient failure, and return the first bulletproof
    /// response. Exhausting the pool returns `NoProviderAvailable` carrying
    /// the full attempt log (spec §7).
    pub async fn route(
        &self,
        request: &NormalizedRequest,
        strategy: SelectionStrategy,
    ) -> KernelResult<RoutedResponse> {
        let candidates = self.ordered_candidates(strategy, request.capability_hint.as_deref()).await;
        let mut attempts = Vec::new();

        for provider in candidates {
            let adapter = match self.factory.create(&provider.provider_id) {
                Some(a) => a,
                None => continue,
            };

            if self.breaker.check(&provider.provider_id).await.is_blocked() {
                attempts.push(ProviderAttempt {
                    provider_id: provider.provider_id.clone(),
                    outcome: AttemptOutcome::BreakerOpen,
                    duration_ms: 0,
                });
                continue;
            }

            let mut backoff = ExponentialBackoff {
                initial_interval: self.config.retry_initial_interval,
                max_interval: self.config.retry_max_interval,
                max_elapsed_time: Some(provider.absolute_timeout),
                ..ExponentialBackoff::default()
            };

            let mut remaining_retries = provider.max_retries;
            loop {
                let started = Instant::now();
                let outcome = adapter.invoke(request, provider.absolute_timeout).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                match outcome {
                    Ok(response) => {
                        if let Err(reason) = self.validate_response(&response) {
                            attempts.push(ProviderAttempt {
                                provider_id: provider.provider_id.clone(),
                                outcome: AttemptOutcome::MalformedResponse,
                                duration_ms,
                            });
                            self.record_breaker_outcome(&provider.provider_id, false).await;
                            self.metrics.record_request(&provider.provider_id, duration_ms, false).await;
                            tracing::warn!(provider_id = %provider.provider_id, %reason, "rejected non-bulletproof response");
                            break;
                        }

                        attempts.push(ProviderAttempt {
                            provider_id: provider.provider_id.clone(),
                            outcome: AttemptOutcome::Ok,
                            duration_ms,
                        });
                        self.record_breaker_outcome(&provider.provider_id, true).await;
                        self.latency.lock().await.record(&provider.provider_id, duration_ms);
                        let cost_usd = provider.expected_cost_usd(response.input_tokens, response.output_tokens);
                        self.metrics.record_request(&provider.provider_id, duration_ms, true).await;
                        self.metrics
                            .record_tokens(&provider.provider_id, response.input_tokens, response.output_tokens, cost_usd)
                            .await;
                        return Ok(RoutedResponse {
                            response,
                            provider_id: provider.provider_id.clone(),
                            cost_usd,
                        });
                    }
                    Err(adapter_err) => {
                        attempts.push(ProviderAttempt {
                            provider_id: provider.provider_id.clone(),
                            outcome: adapter_err.as_attempt_outcome(),
                            duration_ms,
                        });
                        self.record_breaker_outcome(&provider.provider_id, false).await;
                        self.metrics.record_request(&provider.provider_id, duration_ms, false).await;
                        self.mark_unavailable(&provider.provider_id, &adapter_err).await;

                        let retryable = matches!(
                            adapter_err,
                            ProviderAdapterError::Server(_) | ProviderAdapterError::Timeout | ProviderAdapterError::Network(_)
                        );

                        if retryable && remaining_retries > 0 {
                            if let Some(delay) = backoff.next_backoff() {
                                remaining_retries -= 1;
                                tokio::time::sleep(delay).await;
                                continue;
                            }
                        }
                        break;
                    }
                }
            }
        }

        Err(KernelError::NoProviderAvailable { attempts })
    }

    pub fn provider_ids(&self) -> HashSet<String> {
        self.providers.iter().map(|p| p.provider_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, priority: u32, cost: f64) -> ProviderRecord {
        ProviderRecord {
            provider_id: id.to_string(),
            tier: 1,
            priority,
            model_id: "m".to_string(),
            endpoint_template: "https://example.invalid".to_string(),
            auth_ref: format!("secret:{id}"),
            capability_tags: HashSet::new(),
            cost_per_input_token_usd: cost,
            cost_per_output_token_usd: cost,
            absolute_timeout: Duration::from_secs(10),
            max_retries: 1,
            enabled: true,
        }
    }

    struct NullFactory;
    impl ProviderAdapterFactory for NullFactory {
        fn create(&self, _provider_id: &str) -> Option<Arc<dyn crate::domain::ports::ProviderAdapter>> {
            None
        }
        fn available_provider_ids(&self) -> Vec<String> {
            vec![]
        }
    }

    #[tokio::test]
    async fn cost_optimized_orders_by_cost() {
        let router = ProviderRouter::new(
            vec![provider("expensive", 1, 0.01), provider("cheap", 2, 0.001)],
            Arc::new(NullFactory),
            Arc::new(CircuitBreakerService::with_defaults()),
            ProviderRouterConfig::default(),
            Arc::new(MetricsRegistry::new()),
        );
        let ordered = router.ordered_candidates(SelectionStrategy::CostOptimized, None).await;
        assert_eq!(ordered[0].provider_id, "cheap");
    }

    #[test]
    fn rejects_fake_response_fingerprint() {
        let router = ProviderRouter::new(
            vec![],
            Arc::new(NullFactory),
            Arc::new(CircuitBreakerService::with_defaults()),
            ProviderRouterConfig::default(),
            Arc::new(MetricsRegistry::new()),
        );
        let response = NormalizedResponse {
            content: "As an AI language model, I cannot help.".to_string(),
            input_tokens: 10,
            output_tokens: 5,
        };
        assert!(router.validate_response(&response).is_err());
    }

    #[tokio::test]
    async fn auth_failure_permanently_disables_provider() {
        use crate::adapters::provider_mock::{MockFailure, MockOutcome, MockProviderAdapter, MockProviderAdapterFactory};

        let bad = Arc::new(MockProviderAdapter::with_default_outcome("bad", MockOutcome::Fail(MockFailure::Auth)));
        let good = Arc::new(MockProviderAdapter::with_default_outcome(
            "good",
            MockOutcome::Respond { content: "a real answer, plenty of content".to_string(), input_tokens: 10, output_tokens: 5 },
        ));
        let factory = Arc::new(MockProviderAdapterFactory::new(vec![bad, good]));
        let router = ProviderRouter::new(
            vec![provider("bad", 1, 0.001), provider("good", 2, 0.001)],
            factory,
            Arc::new(CircuitBreakerService::with_defaults()),
            ProviderRouterConfig::default(),
            Arc::new(MetricsRegistry::new()),
        );
        let request = NormalizedRequest {
            prompt: "hi".to_string(),
            system_prompt: None,
            max_tokens: 100,
            temperature: 0.0,
            capability_hint: None,
            per_call_timeout: Duration::from_secs(1),
        };

        let first = router.route(&request, SelectionStrategy::PriorityOrder).await.unwrap();
        assert_eq!(first.provider_id, "good");

        // "bad" should now be excluded from candidates entirely, not retried.
        let candidates = router.ordered_candidates(SelectionStrategy::PriorityOrder, None).await;
        assert!(!candidates.iter().any(|p| p.provider_id == "bad"));

        router.reset_provider("bad").await;
        let candidates = router.ordered_candidates(SelectionStrategy::PriorityOrder, None).await;
        assert!(candidates.iter().any(|p| p.provider_id == "bad"));
    }

    #[tokio::test]
    async fn exhausting_providers_returns_attempt_log() {
        let router = ProviderRouter::new(
            vec![provider("only", 1, 0.01)],
            Arc::new(NullFactory),
            Arc::new(CircuitBreakerService::with_defaults()),
            ProviderRouterConfig::default(),
            Arc::new(MetricsRegistry::new()),
        );
        let request = NormalizedRequest {
            prompt: "hi".to_string(),
            system_prompt: None,
            max_tokens: 100,
            temperature: 0.0,
            capability_hint: None,
            per_call_timeout: Duration::from_secs(1),
        };
        let err = router.route(&request, SelectionStrategy::PriorityOrder).await.unwrap_err();
        assert!(matches!(err, KernelError::NoProviderAvailable { .. }));
    }
}

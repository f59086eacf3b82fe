//! Metrics, tracing spans, and the SLO/error-budget evaluator (spec §4.11 / C11).
//!
//! Spans are emitted via `tracing` at the call sites that own them (task,
//! workflow step, tool call, provider invocation); this module owns the
//! counters/histograms those call sites feed and the background SLO
//! evaluator that reads them. Grounded on `infrastructure::logging` for the
//! tracing setup and on `services::circuit_breaker`'s windowed-counting
//! style, applied here to SLO math instead of failure thresholds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// A single latency sample bucketed by a fixed set of percentile markers.
/// Kept as a bounded reservoir rather than every raw sample, matching the
/// learning loop's bounded-reservoir approach to the same problem.
#[derive(Debug, Default)]
struct LatencyReservoir {
    samples: Vec<u64>,
    capacity: usize,
}

impl LatencyReservoir {
    fn new(capacity: usize) -> Self {
        Self { samples: Vec::with_capacity(capacity), capacity }
    }

    fn record(&mut self, duration_ms: u64) {
        if self.samples.len() >= self.capacity {
            self.samples.remove(0);
        }
        self.samples.push(duration_ms);
    }

    fn percentile(&self, p: f64) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted.get(idx).copied()
    }
}

/// Counters and latency histograms for one logical metric family (e.g. one
/// provider, or one agent).
#[derive(Default)]
struct MetricFamily {
    requests: AtomicU64,
    errors: AtomicU64,
    cache_exact_hits: AtomicU64,
    cache_semantic_hits: AtomicU64,
    breaker_transitions: AtomicU64,
    rate_limit_denials: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cost_micros_usd: AtomicU64,
    latencies: RwLock<LatencyReservoir>,
}

impl MetricFamily {
    fn new() -> Self {
        Self { latencies: RwLock::new(LatencyReservoir::new(1024)), ..Default::default() }
    }
}

/// Records metrics keyed by an arbitrary dimension name (an agent id, a
/// provider id, or a fixed `"global"` key for process-wide totals).
pub struct MetricsRegistry {
    families: RwLock<HashMap<String, Arc<MetricFamily>>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self { families: RwLock::new(HashMap::new()) }
    }

    async fn family(&self, key: &str) -> Arc<MetricFamily> {
        if let Some(existing) = self.families.read().await.get(key) {
            return existing.clone();
        }
        let mut families = self.families.write().await;
        families.entry(key.to_string()).or_insert_with(|| Arc::new(MetricFamily::new())).clone()
    }

    pub async fn record_request(&self, key: &str, duration_ms: u64, succeeded: bool) {
        let family = self.family(key).await;
        family.requests.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            family.errors.fetch_add(1, Ordering::Relaxed);
        }
        family.latencies.write().await.record(duration_ms);
    }

    pub async fn record_tokens(&self, key: &str, input_tokens: u64, output_tokens: u64, cost_usd: f64) {
        let family = self.family(key).await;
        family.input_tokens.fetch_add(input_tokens, Ordering::Relaxed);
        family.output_tokens.fetch_add(output_tokens, Ordering::Relaxed);
        family.cost_micros_usd.fetch_add((cost_usd * 1_000_000.0) as u64, Ordering::Relaxed);
    }

    pub async fn record_cache_hit(&self, key: &str, exact: bool) {
        let family = self.family(key).await;
        if exact {
            family.cache_exact_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            family.cache_semantic_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn record_breaker_transition(&self, key: &str) {
        self.family(key).await.breaker_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn record_rate_limit_denial(&self, key: &str) {
        self.family(key).await.rate_limit_denials.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot availability (fraction of requests that succeeded) and p95
    /// latency for `key`, used by the SLO evaluator.
    async fn snapshot(&self, key: &str) -> Option<MetricSnapshot> {
        let family = self.families.read().await.get(key)?.clone();
        let requests = family.requests.load(Ordering::Relaxed);
        if requests == 0 {
            return None;
        }
        let errors = family.errors.load(Ordering::Relaxed);
        let availability = 1.0 - (errors as f64 / requests as f64);
        let p95_ms = family.latencies.read().await.percentile(0.95).unwrap_or(0);
        let cost_per_request_usd =
            family.cost_micros_usd.load(Ordering::Relaxed) as f64 / 1_000_000.0 / requests as f64;
        Some(MetricSnapshot { requests, availability, p95_ms, cost_per_request_usd })
    }
}

#[derive(Debug, Clone, Copy)]
struct MetricSnapshot {
    requests: u64,
    availability: f64,
    p95_ms: u64,
    cost_per_request_usd: f64,
}

/// Declared service-level objectives (spec §4.11).
#[derive(Debug, Clone, Copy)]
pub struct SloTargets {
    pub availability: f64,
    pub p95_latency_ms: u64,
    pub cost_per_request_usd: f64,
}

impl Default for SloTargets {
    fn default() -> Self {
        Self { availability: 0.995, p95_latency_ms: 1_500, cost_per_request_usd: 0.50 }
    }
}

/// How urgently the remaining error budget is being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnClassification {
    Healthy,
    SlowBurn,
    FastBurn,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SloEvaluation {
    pub key: String,
    pub error_budget_remaining_pct: f64,
    pub p95_latency_ms: u64,
    pub cost_per_request_usd: f64,
    pub classification: BurnClassification,
}

/// Background evaluator that compares rolling metrics against `SloTargets`
/// and classifies the burn rate. Alerts are data: this returns a value, it
/// does not page anyone (spec §4.11 "delivery is the collaborator's
/// responsibility").
pub struct SloEvaluator {
    metrics: Arc<MetricsRegistry>,
    targets: SloTargets,
    fast_burn_window: Duration,
    slow_burn_window: Duration,
}

impl SloEvaluator {
    pub fn new(metrics: Arc<MetricsRegistry>, targets: SloTargets) -> Self {
        Self { metrics, targets, fast_burn_window: Duration::from_secs(300), slow_burn_window: Duration::from_secs(3600 * 6) }
    }

    /// Error budget remaining, normalized to a percentage: `1 - (1 -
    /// observed) / (1 - target)`, clamped to `[0, 100]` since an
    /// availability above target yields a value > 1 otherwise.
    fn error_budget_remaining_pct(&self, observed_availability: f64) -> f64 {
        let target = self.targets.availability;
        if (1.0 - target).abs() < f64::EPSILON {
            return if observed_availability >= target { 100.0 } else { 0.0 };
        }
        let remaining = 1.0 - (1.0 - observed_availability) / (1.0 - target);
        remaining.clamp(0.0, 1.0) * 100.0
    }

    pub async fn evaluate(&self, key: &str) -> Option<SloEvaluation> {
        let snapshot = self.metrics.snapshot(key).await?;
        let remaining_pct = self.error_budget_remaining_pct(snapshot.availability);

        let classification = if remaining_pct <= 0.0 {
            BurnClassification::FastBurn
        } else if snapshot.p95_ms > self.targets.p95_latency_ms || remaining_pct < 50.0 {
            BurnClassification::SlowBurn
        } else {
            BurnClassification::Healthy
        };

        Some(SloEvaluation {
            key: key.to_string(),
            error_budget_remaining_pct: remaining_pct,
            p95_latency_ms: snapshot.p95_ms,
            cost_per_request_usd: snapshot.cost_per_request_usd,
            classification,
        })
    }

    pub fn fast_burn_window(&self) -> Duration {
        self.fast_burn_window
    }

    pub fn slow_burn_window(&self) -> Duration {
        self.slow_burn_window
    }
}

/// RAII helper for timing a span of work and recording it into a
/// `MetricsRegistry` on drop-independent completion (callers call
/// `finish` explicitly; there is no `Drop` impl because async cleanup
/// can't run there).
pub struct RequestTimer {
    started: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self { started: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthy_service_reports_full_error_budget() {
        let metrics = Arc::new(MetricsRegistry::new());
        for _ in 0..100 {
            metrics.record_request("provider-a", 200, true).await;
        }
        let evaluator = SloEvaluator::new(metrics, SloTargets::default());
        let eval = evaluator.evaluate("provider-a").await.unwrap();

        assert_eq!(eval.classification, BurnClassification::Healthy);
        assert!(eval.error_budget_remaining_pct > 99.0);
    }

    #[tokio::test]
    async fn high_error_rate_triggers_fast_burn() {
        let metrics = Arc::new(MetricsRegistry::new());
        for i in 0..100 {
            metrics.record_request("provider-b", 200, i % 2 == 0).await;
        }
        let evaluator = SloEvaluator::new(metrics, SloTargets::default());
        let eval = evaluator.evaluate("provider-b").await.unwrap();

        assert_eq!(eval.classification, BurnClassification::FastBurn);
    }

    #[tokio::test]
    async fn unknown_key_has_no_snapshot() {
        let metrics = Arc::new(MetricsRegistry::new());
        let evaluator = SloEvaluator::new(metrics, SloTargets::default());
        assert!(evaluator.evaluate("ghost").await.is_none());
    }

    #[tokio::test]
    async fn latency_reservoir_tracks_p95() {
        let metrics = Arc::new(MetricsRegistry::new());
        for ms in 1..=100u64 {
            metrics.record_request("provider-c", ms, true).await;
        }
        let snapshot = metrics.snapshot("provider-c").await.unwrap();
        assert!(snapshot.p95_ms >= 90 && snapshot.p95_ms <= 100);
    }
}

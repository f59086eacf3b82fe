//! Per-provider circuit breaker (spec §4.2 / C2).
//!
//! Grounded on the teacher's `services::circuit_breaker` state machine
//! (Closed/Open/HalfOpen, failure-window pruning, half-open success
//! threshold) but re-scoped from the teacher's `CircuitScope` enum down to
//! a single provider key, and switched from `chrono::Utc::now()` to
//! `std::time::Instant` because spec §5 requires monotonic timers with no
//! wall-clock comparisons (REDESIGN).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Configuration for a provider's circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub success_threshold: u32,
    pub failure_window: Duration,
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
            success_threshold: 2,
            failure_window: Duration::from_secs(600),
            enabled: true,
        }
    }
}

/// State of a provider's circuit breaker (spec §3 `ProviderHealth.breaker_state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
struct FailureRecord {
    at: Instant,
}

/// A single provider's breaker state.
#[derive(Debug, Clone)]
struct CircuitBreaker {
    state: CircuitState,
    failures: Vec<FailureRecord>,
    half_open_successes: u32,
    opened_at: Option<Instant>,
    open_count: u32,
}

impl CircuitBreaker {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: Vec::new(),
            half_open_successes: 0,
            opened_at: None,
            open_count: 0,
        }
    }

    fn record_failure(&mut self, now: Instant, config: &CircuitBreakerConfig) {
        self.failures.push(FailureRecord { at: now });
        let cutoff = now.checked_sub(config.failure_window).unwrap_or(now);
        self.failures.retain(|f| f.at > cutoff);

        if self.state == CircuitState::Closed && self.failures.len() as u32 >= config.failure_threshold {
            self.open(now);
        } else if self.state == CircuitState::HalfOpen {
            self.open(now);
        }
    }

    fn record_success(&mut self, config: &CircuitBreakerConfig) {
        if self.state == CircuitState::HalfOpen {
            self.half_open_successes += 1;
            if self.half_open_successes >= config.success_threshold {
                self.close();
            }
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.half_open_successes = 0;
        self.open_count += 1;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.half_open_successes = 0;
        self.failures.clear();
    }

    fn half_open(&mut self) {
        self.state = CircuitState::HalfOpen;
        self.half_open_successes = 0;
    }

    fn allows(&mut self, now: Instant, config: &CircuitBreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if let Some(opened_at) = self.opened_at {
                    if now.duration_since(opened_at) > config.open_timeout {
                        self.half_open();
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    fn reset(&mut self) {
        self.close();
        self.open_count = 0;
    }
}

/// Outcome of checking whether a provider may be invoked.
#[derive(Debug, Clone)]
pub enum CircuitCheckResult {
    Allowed,
    Blocked { opened_at: Instant, retry_after: Instant },
    Testing,
}

impl CircuitCheckResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed | Self::Testing)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitStats {
    pub provider_id: String,
    pub state: String,
    pub failure_count: usize,
    pub open_count: u32,
}

/// Per-provider circuit breaker registry, checked by the provider router
/// (C1) before every invocation and updated with the outcome afterward.
pub struct CircuitBreakerService {
    config: CircuitBreakerConfig,
    circuits: Arc<RwLock<HashMap<String, CircuitBreaker>>>,
}

impl CircuitBreakerService {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, circuits: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    pub async fn check(&self, provider_id: &str) -> CircuitCheckResult {
        if !self.config.enabled {
            return CircuitCheckResult::Allowed;
        }

        let now = Instant::now();
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(provider_id.to_string()).or_insert_with(CircuitBreaker::new);

        if circuit.allows(now, &self.config) {
            if circuit.state == CircuitState::HalfOpen {
                CircuitCheckResult::Testing
            } else {
                CircuitCheckResult::Allowed
            }
        } else {
            let opened_at = circuit.opened_at.unwrap_or(now);
            CircuitCheckResult::Blocked { opened_at, retry_after: opened_at + self.config.open_timeout }
        }
    }

    pub async fn record_failure(&self, provider_id: &str) {
        if !self.config.enabled {
            return;
        }
        let now = Instant::now();
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(provider_id.to_string()).or_insert_with(CircuitBreaker::new);
        circuit.record_failure(now, &self.config);
    }

    pub async fn record_success(&self, provider_id: &str) {
        if !self.config.enabled {
            return;
        }
        let mut circuits = self.circuits.write().await;
        if let Some(circuit) = circuits.get_mut(provider_id) {
            circuit.record_success(&self.config);
        }
    }

    pub async fn state(&self, provider_id: &str) -> CircuitState {
        let circuits = self.circuits.read().await;
        circuits.get(provider_id).map(|c| c.state).unwrap_or(CircuitState::Closed)
    }

    pub async fn stats(&self) -> Vec<CircuitStats> {
        let circuits = self.circuits.read().await;
        circuits
            .iter()
            .map(|(id, c)| CircuitStats {
                provider_id: id.clone(),
                state: c.state.as_str().to_string(),
                failure_count: c.failures.len(),
                open_count: c.open_count,
            })
            .collect()
    }

    pub async fn open_providers(&self) -> Vec<String> {
        let circuits = self.circuits.read().await;
        circuits.iter().filter(|(_, c)| c.state == CircuitState::Open).map(|(id, _)| id.clone()).collect()
    }

    pub async fn reset(&self, provider_id: &str) {
        let mut circuits = self.circuits.write().await;
        if let Some(circuit) = circuits.get_mut(provider_id) {
            circuit.reset();
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let service = CircuitBreakerService::new(CircuitBreakerConfig { failure_threshold: 3, ..Default::default() });
        service.record_failure("openai").await;
        service.record_failure("openai").await;
        assert!(service.check("openai").await.is_allowed());
        service.record_failure("openai").await;
        assert!(service.check("openai").await.is_blocked());
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let service = CircuitBreakerService::new(CircuitBreakerConfig {
            failure_threshold: 2,
            open_timeout: Duration::from_millis(0),
            ..Default::default()
        });
        service.record_failure("anthropic").await;
        service.record_failure("anthropic").await;
        assert_eq!(service.state("anthropic").await, CircuitState::Open);
        // open_timeout of 0 means the next check transitions straight to half-open.
        assert!(service.check("anthropic").await.is_allowed());
        assert_eq!(service.state("anthropic").await, CircuitState::HalfOpen);
        service.record_failure("anthropic").await;
        assert_eq!(service.state("anthropic").await, CircuitState::Open);
    }

    #[tokio::test]
    async fn disabled_breaker_never_blocks() {
        let service = CircuitBreakerService::new(CircuitBreakerConfig { enabled: false, failure_threshold: 1, ..Default::default() });
        for _ in 0..10 {
            service.record_failure("x").await;
        }
        assert!(service.check("x").await.is_allowed());
    }
}

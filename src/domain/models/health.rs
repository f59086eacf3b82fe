//! ProviderHealth domain model (spec §3 "ProviderHealth").
//!
//! Lives per-provider, in-memory, and is mirrored to the shared fast store
//! for replica visibility (spec §9's "process-wide state... back external
//! sharing with the shared fast store"). Uses monotonic `Instant` per spec
//! §5 ("Timers use monotonic time; no wall-clock comparisons").

use std::time::Instant;

use crate::services::circuit_breaker::CircuitState;

/// Mutable, per-provider health snapshot. `breaker_state` is mutated only
/// by the circuit breaker service upon each invocation outcome (spec §3
/// invariant); `disabled` and `rate_limit_until` are mutated by the
/// provider router itself on 401/403 and 429 outcomes (spec §4.1).
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub breaker_state: CircuitState,
    pub last_success: Option<Instant>,
    pub last_failure: Option<Instant>,
    pub consecutive_failures: u32,
    pub rolling_error_rate: f64,
    pub estimated_quota_remaining: Option<u64>,
    pub rate_limit_until: Option<Instant>,
    /// Set permanently on a 401/403 outcome; only cleared via admin reset.
    pub disabled: bool,
}

impl ProviderHealth {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            breaker_state: CircuitState::Closed,
            last_success: None,
            last_failure: None,
            consecutive_failures: 0,
            rolling_error_rate: 0.0,
            estimated_quota_remaining: None,
            rate_limit_until: None,
            disabled: false,
        }
    }

    pub fn is_rate_limited(&self, now: Instant) -> bool {
        self.rate_limit_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn is_available(&self, now: Instant) -> bool {
        !self.disabled && !self.is_rate_limited(now)
    }
}

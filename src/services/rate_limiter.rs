//! Sliding-window rate limiter, keyed by (principal, scope) (spec §4.3 / C3).
//!
//! Grounded on the teacher's `governor`-backed throttling pattern (already
//! a teacher dependency for per-provider call pacing) combined with the
//! domain's `RateBucket` sliding-window accounting. Admission never blocks:
//! a caller over its limit gets `KernelError::RateLimited` immediately with
//! a `retry_after` hint (spec §5 "never block a caller waiting on another
//! caller's quota").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::domain::errors::{KernelError, KernelResult};
use crate::domain::models::rate::{RateBucket, RateKey};
use crate::domain::ports::SharedStore;

/// Bucket configuration for a single scope (e.g. a tool name or provider id).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window: Duration,
}

/// In-process sliding-window limiter. Single-process-only (spec §9 Open
/// Question: shared-store-backed limiting is the primary mode; this is the
/// fallback used when no `SharedStore` adapter is configured).
pub struct InMemoryRateLimiter {
    buckets: Arc<RwLock<HashMap<RateKey, RateBucket>>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self { buckets: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn admit(&self, principal: &str, scope: &str, rule: RateLimitRule) -> KernelResult<()> {
        let key = RateKey::new(principal, scope);
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .entry(key.clone())
            .or_insert_with(|| RateBucket::new(key, rule.window, rule.limit));

        bucket.try_admit(now).map_err(|retry_after| KernelError::RateLimited { retry_after })
    }

    /// Drop idle buckets to bound memory growth across distinct principals.
    pub async fn sweep_idle(&self, idle_after: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        buckets.retain(|_, bucket| !bucket.is_idle(now, idle_after));
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared-store-backed limiter for multi-replica deployments. Uses the
/// store's atomic increment to implement a fixed-window counter: coarser
/// than the in-memory sliding window but safe across processes.
pub struct SharedStoreRateLimiter {
    store: Arc<dyn SharedStore>,
}

impl SharedStoreRateLimiter {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    pub async fn admit(&self, principal: &str, scope: &str, rule: RateLimitRule) -> KernelResult<()> {
        let key = format!("ratelimit:{principal}:{scope}");
        let count = self.store.increment(&key, 1, Some(rule.window)).await?;
        if count as u32 > rule.limit {
            return Err(KernelError::RateLimited { retry_after: rule.window });
        }
        Ok(())
    }
}

/// Facade selecting between the two admission strategies; constructed once
/// at startup per `KernelConfig.rate_limiter.shared_store_backed`.
pub enum RateLimiter {
    InMemory(InMemoryRateLimiter),
    SharedStore(SharedStoreRateLimiter),
}

impl RateLimiter {
    pub async fn admit(&self, principal: &str, scope: &str, rule: RateLimitRule) -> KernelResult<()> {
        match self {
            Self::InMemory(limiter) => limiter.admit(principal, scope, rule).await,
            Self::SharedStore(limiter) => limiter.admit(principal, scope, rule).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_limit_then_rejects() {
        let limiter = InMemoryRateLimiter::new();
        let rule = RateLimitRule { limit: 2, window: Duration::from_secs(60) };

        assert!(limiter.admit("alice", "search_tool", rule).await.is_ok());
        assert!(limiter.admit("alice", "search_tool", rule).await.is_ok());
        let err = limiter.admit("alice", "search_tool", rule).await.unwrap_err();
        assert!(matches!(err, KernelError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn scopes_are_independent_per_principal() {
        let limiter = InMemoryRateLimiter::new();
        let rule = RateLimitRule { limit: 1, window: Duration::from_secs(60) };

        assert!(limiter.admit("alice", "search_tool", rule).await.is_ok());
        assert!(limiter.admit("bob", "search_tool", rule).await.is_ok());
    }
}

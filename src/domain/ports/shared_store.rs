//! Shared fast store port (spec §6 persistence boundary: "Cache, rate,
//! dedup, breaker state use a shared fast store").
//!
//! Modeled as a narrow key/value CAS primitive so rate limiting, exact
//! caching and dedup bookkeeping can be backed by a single replicated store
//! (e.g. Redis) without any of those services knowing the storage details.
//! The in-memory adapter (`adapters::shared_store_memory`) satisfies this
//! port for single-process deployments (spec §9 open question).

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::KernelResult;

/// A narrow shared key/value store with atomic compare-and-set, sufficient
/// to back C3's sliding-window admission and C4/C5's key-based lookups
/// without exposing Redis (or any backend) specifics to callers.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Get the raw bytes stored at `key`, if present and not expired.
    async fn get(&self, key: &str) -> KernelResult<Option<Vec<u8>>>;

    /// Unconditionally set `key` to `value` with an optional TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> KernelResult<()>;

    /// Atomic compare-and-swap: succeeds and stores `new` only if the
    /// current value equals `expected` (`None` means "key absent").
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        new: Vec<u8>,
        ttl: Option<Duration>,
    ) -> KernelResult<bool>;

    /// Atomically increment a counter at `key` by `delta`, creating it at
    /// `delta` if absent, and return the post-increment value.
    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> KernelResult<i64>;

    async fn delete(&self, key: &str) -> KernelResult<()>;
}

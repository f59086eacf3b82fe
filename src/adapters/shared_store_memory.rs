//! In-process `SharedStore` adapter for single-process deployments (spec
//! §6/§9 open question: "a real deployment backs this with Redis; a
//! single-process demo can satisfy the same port in-memory").
//!
//! Grounded on the teacher's in-memory repository adapters' lock-a-HashMap
//! shape; TTL expiry is checked lazily on read rather than via a background
//! sweep, mirroring `InMemoryRateLimiter::sweep_idle`'s lazy-cleanup style
//! in `services::rate_limiter`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::KernelResult;
use crate::domain::ports::SharedStore;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory `SharedStore` backed by a single mutex-guarded map. Adequate
/// for a single-process deployment; a replicated backend (Redis et al.)
/// implements the same port for multi-process fleets.
#[derive(Default)]
pub struct InMemorySharedStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemorySharedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStore for InMemorySharedStore {
    async fn get(&self, key: &str) -> KernelResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> KernelResult<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.entries.lock().await.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<Vec<u8>>,
        new: Vec<u8>,
        ttl: Option<Duration>,
    ) -> KernelResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let current = entries.get(key).filter(|e| e.is_live(now)).map(|e| e.value.clone());

        if current == expected {
            let expires_at = ttl.map(|d| now + d);
            entries.insert(key.to_string(), Entry { value: new, expires_at });
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> KernelResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let current = entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| i64::from_le_bytes(e.value.as_slice().try_into().unwrap_or_default()))
            .unwrap_or(0);

        let next = current + delta;
        let expires_at = ttl.map(|d| now + d);
        entries.insert(key.to_string(), Entry { value: next.to_le_bytes().to_vec(), expires_at });
        Ok(next)
    }

    async fn delete(&self, key: &str) -> KernelResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemorySharedStore::new();
        store.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let store = InMemorySharedStore::new();
        store.set("k", b"v".to_vec(), Some(Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_expected() {
        let store = InMemorySharedStore::new();
        store.set("k", b"v1".to_vec(), None).await.unwrap();

        let ok = store.compare_and_swap("k", Some(b"wrong".to_vec()), b"v2".to_vec(), None).await.unwrap();
        assert!(!ok);
        assert_eq!(store.get("k").await.unwrap(), Some(b"v1".to_vec()));

        let ok = store.compare_and_swap("k", Some(b"v1".to_vec()), b"v2".to_vec(), None).await.unwrap();
        assert!(ok);
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn increment_accumulates_and_creates_on_first_use() {
        let store = InMemorySharedStore::new();
        assert_eq!(store.increment("count", 1, None).await.unwrap(), 1);
        assert_eq!(store.increment("count", 4, None).await.unwrap(), 5);
    }
}

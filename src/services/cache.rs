//! Three-tier response cache: exact, semantic, negative (spec §4.4 / C4).
//!
//! Grounded on the teacher's `cost_tracker`/`context_window` style of
//! guarded in-memory state plus the `VectorIndex` port for the semantic
//! tier. Fingerprints are computed with `blake3` rather than a
//! cryptographic hash the teacher doesn't already depend on, matching the
//! "fast fingerprinting for cache keys" rationale in the dependency ledger.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::domain::errors::KernelResult;
use crate::domain::models::cache_entry::{CacheEntry, Fingerprint};
use crate::domain::ports::VectorIndex;

/// Compute a stable fingerprint over (agent id, normalized prompt, options)
/// for exact-match and dedup lookups (spec §3 `CacheEntry.key`).
pub fn fingerprint(agent_id: &str, normalized_prompt: &str, normalized_options: &str) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(agent_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(normalized_prompt.as_bytes());
    hasher.update(b"\0");
    hasher.update(normalized_options.as_bytes());
    Fingerprint(hasher.finalize().to_hex().to_string())
}

struct ExactCache {
    entries: HashMap<Fingerprint, CacheEntry>,
    order: Vec<Fingerprint>,
    capacity: usize,
}

impl ExactCache {
    fn new(capacity: usize) -> Self {
        Self { entries: HashMap::new(), order: Vec::new(), capacity }
    }

    fn get(&mut self, key: &Fingerprint) -> Option<CacheEntry> {
        let now = Utc::now();
        let expired = self.entries.get(key).map(|e| e.is_expired(now)).unwrap_or(false);
        if expired {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            return None;
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.access_count += 1;
            self.touch(key);
            return Some(entry.clone());
        }
        None
    }

    fn touch(&mut self, key: &Fingerprint) {
        self.order.retain(|k| k != key);
        self.order.push(key.clone());
    }

    fn put(&mut self, entry: CacheEntry) {
        let key = entry.key.clone();
        self.entries.insert(key.clone(), entry);
        self.touch(&key);
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.first().cloned() {
                self.order.remove(0);
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

/// Negative cache: remembers inputs known to produce contract violations or
/// terminal errors, so the orchestrator can short-circuit re-invocation
/// within a short TTL (spec §4.4 "negative cache").
struct NegativeCache {
    entries: HashMap<Fingerprint, Instant>,
    ttl: Duration,
}

impl NegativeCache {
    fn new(ttl: Duration) -> Self {
        Self { entries: HashMap::new(), ttl }
    }

    fn record(&mut self, key: Fingerprint) {
        self.entries.insert(key, Instant::now());
    }

    fn is_known_bad(&mut self, key: &Fingerprint) -> bool {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(at) if now.duration_since(*at) <= self.ttl => true,
            Some(_) => {
                self.entries.remove(key);
                false
            }
            None => false,
        }
    }
}

/// Outcome of a cache lookup, distinguishing exact hits from looser
/// semantic matches so callers can apply different quality gates.
pub enum CacheLookup {
    ExactHit(CacheEntry),
    SemanticHit { entry_key: String, similarity: f32 },
    KnownBad,
    Miss,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub exact_capacity: usize,
    pub semantic_similarity_threshold: f32,
    pub negative_ttl: Duration,
    pub default_entry_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            exact_capacity: 10_000,
            semantic_similarity_threshold: 0.95,
            negative_ttl: Duration::from_secs(30),
            default_entry_ttl_secs: 3600,
        }
    }
}

pub struct ResponseCache {
    config: CacheConfig,
    exact: tokio::sync::Mutex<ExactCache>,
    negative: tokio::sync::Mutex<NegativeCache>,
    vector_index: Option<Arc<dyn VectorIndex>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, vector_index: Option<Arc<dyn VectorIndex>>) -> Self {
        Self {
            exact: tokio::sync::Mutex::new(ExactCache::new(config.exact_capacity)),
            negative: tokio::sync::Mutex::new(NegativeCache::new(config.negative_ttl)),
            config,
            vector_index,
        }
    }

    /// Check exact, then semantic, then negative cache, in that priority
    /// order (spec §4.4: exact match always wins over a semantic match).
    /// The semantic tier is scoped to `agent_id`: a nearest neighbor cached
    /// under a different agent's identity can never surface as a hit here.
    pub async fn lookup(&self, key: &Fingerprint, agent_id: &str, embedding: Option<&[f32]>) -> KernelResult<CacheLookup> {
        if let Some(entry) = self.exact.lock().await.get(key) {
            return Ok(CacheLookup::ExactHit(entry));
        }

        if let (Some(index), Some(vector)) = (&self.vector_index, embedding) {
            let matches = index.search(agent_id, vector, 1).await?;
            if let Some(best) = matches.into_iter().next() {
                if best.similarity >= self.config.semantic_similarity_threshold {
                    return Ok(CacheLookup::SemanticHit { entry_key: best.key, similarity: best.similarity });
                }
            }
        }

        if self.negative.lock().await.is_known_bad(key) {
            return Ok(CacheLookup::KnownBad);
        }

        Ok(CacheLookup::Miss)
    }

    pub async fn store(&self, entry: CacheEntry) -> KernelResult<()> {
        if let (Some(index), Some(embedding)) = (&self.vector_index, entry.embedding.clone()) {
            index.upsert(&entry.key.0, embedding, serde_json::json!({ "agent_id": entry.agent_id })).await?;
        }
        self.exact.lock().await.put(entry);
        Ok(())
    }

    pub async fn record_negative(&self, key: Fingerprint) {
        self.negative.lock().await.record(key);
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.config.default_entry_ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, agent_id: &str) -> CacheEntry {
        CacheEntry {
            key: Fingerprint(key.to_string()),
            value: "cached response".to_string(),
            embedding: None,
            agent_id: agent_id.to_string(),
            created_at: Utc::now(),
            ttl_secs: 3600,
            access_count: 0,
        }
    }

    #[tokio::test]
    async fn exact_hit_beats_miss() {
        let cache = ResponseCache::new(CacheConfig::default(), None);
        let key = Fingerprint("abc".to_string());
        cache.store(entry("abc", "writer")).await.unwrap();

        match cache.lookup(&key, "writer", None).await.unwrap() {
            CacheLookup::ExactHit(e) => assert_eq!(e.value, "cached response"),
            _ => panic!("expected exact hit"),
        }
    }

    #[tokio::test]
    async fn eviction_respects_capacity() {
        let cache = ResponseCache::new(CacheConfig { exact_capacity: 2, ..Default::default() }, None);
        cache.store(entry("a", "x")).await.unwrap();
        cache.store(entry("b", "x")).await.unwrap();
        cache.store(entry("c", "x")).await.unwrap();

        let evicted = cache.lookup(&Fingerprint("a".to_string()), "x", None).await.unwrap();
        assert!(matches!(evicted, CacheLookup::Miss));
    }

    #[tokio::test]
    async fn negative_cache_reports_known_bad() {
        let cache = ResponseCache::new(CacheConfig::default(), None);
        let key = Fingerprint("bad".to_string());
        cache.record_negative(key.clone()).await;

        match cache.lookup(&key, "writer", None).await.unwrap() {
            CacheLookup::KnownBad => {}
            _ => panic!("expected known-bad"),
        }
    }

    #[tokio::test]
    async fn semantic_hit_never_crosses_agent_ids() {
        use crate::adapters::InMemoryVectorIndex;

        let index = Arc::new(InMemoryVectorIndex::new());
        let cache = ResponseCache::new(CacheConfig { semantic_similarity_threshold: 0.5, ..Default::default() }, Some(index.clone()));

        cache
            .store(CacheEntry {
                key: Fingerprint("writer-entry".to_string()),
                value: "writer's cached answer".to_string(),
                embedding: Some(vec![1.0, 0.0]),
                agent_id: "writer".to_string(),
                created_at: Utc::now(),
                ttl_secs: 3600,
                access_count: 0,
            })
            .await
            .unwrap();

        let miss_for_other_agent = cache.lookup(&Fingerprint("unseen".to_string()), "reviewer", Some(&[1.0, 0.0])).await.unwrap();
        assert!(matches!(miss_for_other_agent, CacheLookup::Miss));

        let hit_for_same_agent = cache.lookup(&Fingerprint("unseen".to_string()), "writer", Some(&[1.0, 0.0])).await.unwrap();
        assert!(matches!(hit_for_same_agent, CacheLookup::SemanticHit { .. }));
    }
}

//! CacheEntry domain model (spec §3 "CacheEntry", §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable fingerprint over (agent-id, normalized prompt, normalized options).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cached model response with its embedding for semantic lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: Fingerprint,
    pub value: String,
    pub embedding: Option<Vec<f32>>,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.created_at).num_seconds().max(0) as u64;
        age > self.ttl_secs
    }
}

//! Vector index port (spec §6 persistence boundary: "Vector index is a
//! separate component with `upsert(key, vector, payload)` and
//! `search(vector, k) -> [(key, payload, similarity)]`").
//!
//! Grounded on the teacher's `infrastructure::vector::vector_store::VectorStore`
//! (sqlite-vec-backed) but reworked to a storage-agnostic port; the real
//! vector database is an external collaborator per spec §1/§6, so only an
//! in-process adapter ships in this crate (`adapters::vector_index_memory`).

use async_trait::async_trait;

use crate::domain::errors::KernelResult;

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub key: String,
    pub payload: serde_json::Value,
    pub similarity: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, key: &str, vector: Vec<f32>, payload: serde_json::Value) -> KernelResult<()>;

    /// Returns the `k` nearest entries whose payload's `agent_id` field
    /// matches `agent_id`, so one agent's cached response never surfaces as
    /// a semantic hit for another agent's call (spec §4.4 cache isolation).
    async fn search(&self, agent_id: &str, vector: &[f32], k: usize) -> KernelResult<Vec<VectorMatch>>;

    async fn remove(&self, key: &str) -> KernelResult<()>;
}

//! In-process `VectorIndex` adapter: flat storage with a linear cosine
//! scan on search (spec §6: "the real vector database is an external
//! collaborator; only an in-process adapter ships in this crate").
//!
//! Grounded on the teacher's `infrastructure::vector::vector_store::VectorStore`
//! for the upsert/search/remove shape, reworked from its sqlite-vec backing
//! to a plain in-memory map since no ANN index ships here.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::KernelResult;
use crate::domain::ports::{VectorIndex, VectorMatch};

struct Entry {
    vector: Vec<f32>,
    payload: serde_json::Value,
}

/// Flat in-memory vector index. `search` scans every entry and scores by
/// cosine similarity; fine for the semantic-cache scale this kernel
/// operates at, not meant to stand in for a real ANN index at fleet scale.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, key: &str, vector: Vec<f32>, payload: serde_json::Value) -> KernelResult<()> {
        self.entries.write().await.insert(key.to_string(), Entry { vector, payload });
        Ok(())
    }

    async fn search(&self, agent_id: &str, vector: &[f32], k: usize) -> KernelResult<Vec<VectorMatch>> {
        let entries = self.entries.read().await;
        let mut scored: Vec<VectorMatch> = entries
            .iter()
            .filter(|(_, entry)| entry.payload.get("agent_id").and_then(|v| v.as_str()) == Some(agent_id))
            .map(|(key, entry)| VectorMatch {
                key: key.clone(),
                payload: entry.payload.clone(),
                similarity: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn remove(&self, key: &str) -> KernelResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

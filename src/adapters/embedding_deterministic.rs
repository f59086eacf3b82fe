//! Deterministic embedding provider for demo wiring and tests.
//!
//! Grounded on the teacher's `domain::ports::null_embedding::NullEmbeddingProvider`
//! (a stand-in satisfying the port when no real embedding backend is
//! configured), but derives a real fixed-dimension vector from the text's
//! `blake3` hash instead of returning an empty one, so the semantic cache
//! (C5) has something non-trivial to compare against in a demo without a
//! network-backed embedding API.

use async_trait::async_trait;

use crate::domain::errors::KernelResult;
use crate::domain::ports::embedding::{EmbeddingInput, EmbeddingOutput, EmbeddingProvider};

const DIMENSION: usize = 32;

/// Hashes input text into a `DIMENSION`-length unit vector. Texts that
/// differ at all produce near-orthogonal vectors; it carries no semantic
/// meaning, only exact/near-exact text matching, which is sufficient to
/// exercise the semantic cache path without an external embedding service.
#[derive(Debug, Clone, Default)]
pub struct DeterministicEmbeddingProvider;

impl DeterministicEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }

    fn hash_to_vector(text: &str) -> Vec<f32> {
        let hash = blake3::hash(text.as_bytes());
        let bytes = hash.as_bytes();
        let mut vector: Vec<f32> = (0..DIMENSION).map(|i| bytes[i % bytes.len()] as f32 - 128.0).collect();

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbeddingProvider {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn embed(&self, text: &str) -> KernelResult<Vec<f32>> {
        Ok(Self::hash_to_vector(text))
    }

    async fn embed_batch(&self, inputs: &[EmbeddingInput]) -> KernelResult<Vec<EmbeddingOutput>> {
        Ok(inputs
            .iter()
            .map(|input| EmbeddingOutput { id: input.id.clone(), vector: Self::hash_to_vector(&input.text) })
            .collect())
    }

    fn max_batch_size(&self) -> usize {
        256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let provider = DeterministicEmbeddingProvider::new();
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DIMENSION);
    }

    #[tokio::test]
    async fn different_text_embeds_differently() {
        let provider = DeterministicEmbeddingProvider::new();
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("goodbye world").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn embed_batch_preserves_correlation_ids() {
        let provider = DeterministicEmbeddingProvider::new();
        let inputs = vec![
            EmbeddingInput { id: "1".to_string(), text: "a".to_string() },
            EmbeddingInput { id: "2".to_string(), text: "b".to_string() },
        ];
        let outputs = provider.embed_batch(&inputs).await.unwrap();
        assert_eq!(outputs[0].id, "1");
        assert_eq!(outputs[1].id, "2");
    }
}

//! Semantic cache hit scenario: a near-duplicate prompt embeds close
//! enough to a previously-cached entry to skip provider invocation.

use std::sync::Arc;

use amas_kernel::adapters::vector_index_memory::InMemoryVectorIndex;
use amas_kernel::domain::models::cache_entry::{CacheEntry, Fingerprint};
use amas_kernel::services::cache::{fingerprint, CacheConfig, CacheLookup, ResponseCache};

#[tokio::test]
async fn near_duplicate_prompt_hits_semantic_cache_above_threshold() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let config = CacheConfig { semantic_similarity_threshold: 0.85, ..Default::default() };
    let cache = ResponseCache::new(config, Some(index));

    let first_key = fingerprint("research", "What is ML?", "general");
    let first_embedding = vec![1.0_f32, 0.0];
    cache
        .store(CacheEntry {
            key: first_key.clone(),
            value: "v1".to_string(),
            embedding: Some(first_embedding),
            agent_id: "research".to_string(),
            created_at: chrono::Utc::now(),
            ttl_secs: 3600,
            access_count: 0,
        })
        .await
        .unwrap();

    // A second, differently-worded prompt whose embedding has cosine
    // similarity 0.91 with the first (0.91^2 + 0.4150^2 ~= 1, unit vector).
    let second_embedding = [0.91_f32, 0.415_067_8];
    let second_key = fingerprint("research", "Tell me about machine learning", "general");

    match cache.lookup(&second_key, "research", Some(&second_embedding)).await.unwrap() {
        CacheLookup::SemanticHit { entry_key, similarity } => {
            assert_eq!(entry_key, first_key.0);
            assert!((similarity - 0.91).abs() < 0.01);
        }
        _ => panic!("expected a semantic hit"),
    }
}

#[tokio::test]
async fn below_threshold_similarity_is_not_a_hit() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let config = CacheConfig { semantic_similarity_threshold: 0.85, ..Default::default() };
    let cache = ResponseCache::new(config, Some(index));

    let key = fingerprint("research", "What is ML?", "general");
    cache
        .store(CacheEntry {
            key: key.clone(),
            value: "v1".to_string(),
            embedding: Some(vec![1.0, 0.0]),
            agent_id: "research".to_string(),
            created_at: chrono::Utc::now(),
            ttl_secs: 3600,
            access_count: 0,
        })
        .await
        .unwrap();

    let unrelated_embedding = [0.0_f32, 1.0];
    let unrelated_key = fingerprint("research", "What's the weather today?", "general");
    let result = cache.lookup(&unrelated_key, "research", Some(&unrelated_embedding)).await.unwrap();
    assert!(matches!(result, CacheLookup::Miss));
}

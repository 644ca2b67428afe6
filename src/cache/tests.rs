use std::sync::Arc;

use super::*;
use crate::embedding::{EmbeddingCache, MockEmbedder};
use crate::index::VectorIndex;

type TestCache = SemanticCache<VectorIndex, MockEmbedder>;

async fn cache_with_dim(dimension: usize) -> TestCache {
    let store = Arc::new(VectorIndex::new());
    let embedder = Arc::new(CachedEmbedder::new(
        MockEmbedder::new(dimension),
        EmbeddingCache::new(),
    ));
    let cache = SemanticCache::new(store, embedder, SemanticCacheConfig::new(dimension));
    cache.ensure().await.expect("namespace should be created");
    cache
}

#[tokio::test]
async fn test_save_then_search_same_question_hits() {
    let cache = cache_with_dim(32).await;

    cache
        .save("why is the sky blue?", "Rayleigh scattering.", QaMetadata::from_source("external"))
        .await
        .unwrap();

    let hits = cache.search("why is the sky blue?", 5, 0.9).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].question, "why is the sky blue?");
    assert_eq!(hits[0].answer, "Rayleigh scattering.");
    assert!(hits[0].similarity >= 0.9);
    assert_eq!(hits[0].source.as_deref(), Some("external"));
}

#[tokio::test]
async fn test_unrelated_question_misses() {
    let cache = cache_with_dim(32).await;
    cache.embedder().provider().script("a", vec![1.0; 32]);
    cache
        .embedder()
        .provider()
        .script("b", {
            let mut v = vec![0.0; 32];
            v[0] = 1.0;
            v[1] = -1.0;
            v
        });

    cache
        .save("a", "answer a", QaMetadata::from_source("external"))
        .await
        .unwrap();

    let hits = cache.search("b", 5, 0.5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_save_is_write_only() {
    let cache = cache_with_dim(16).await;

    let first = cache
        .save("q", "first answer", QaMetadata::from_source("grounded"))
        .await
        .unwrap();
    let second = cache
        .save("q", "second answer", QaMetadata::from_source("grounded"))
        .await
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(cache.entries().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_save_embeds_question_not_answer() {
    let cache = cache_with_dim(16).await;

    cache
        .save("the question", "the answer", QaMetadata::from_source("external"))
        .await
        .unwrap();

    // The question's embedding is cached; the answer's is not.
    assert!(cache.embedder().cache().contains("the question"));
    assert!(!cache.embedder().cache().contains("the answer"));
}

#[tokio::test]
async fn test_blank_question_rejected_before_io() {
    let cache = cache_with_dim(16).await;

    let err = cache
        .save(" ", "answer", QaMetadata::from_source("external"))
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::Embedding(_)));
    assert_eq!(cache.entries().await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_remove_deletes_entry() {
    let cache = cache_with_dim(16).await;

    let id = cache
        .save("q", "a", QaMetadata::from_source("external"))
        .await
        .unwrap();

    assert!(cache.remove(&id).await.unwrap());
    assert!(!cache.remove(&id).await.unwrap());
    assert!(cache.search("q", 5, 0.0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_explicit_timestamp_is_kept() {
    let cache = cache_with_dim(16).await;

    cache
        .save(
            "q",
            "a",
            QaMetadata {
                source: "external".into(),
                timestamp: Some(42),
            },
        )
        .await
        .unwrap();

    let hits = cache.search("q", 1, 0.5).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_ensure_twice_is_idempotent() {
    let cache = cache_with_dim(16).await;
    assert!(cache.ensure().await.is_ok());
}

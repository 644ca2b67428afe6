//! Content-addressed embedding cache.
//!
//! Keyed by [`crate::hashing::embedding_key`]: same text, same key, same
//! vector. Entries are immutable and never expire; the capacity cap bounds
//! memory, it is not required for correctness. Overwriting a key with a
//! *different* vector is a caller error this component does not detect.
//! The key is derived from the text, so that can only happen if the
//! embedding provider itself is nondeterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::sync::Cache;
use tracing::debug;

use super::error::EmbeddingError;
use super::EmbeddingProvider;
use crate::hashing::embedding_key;

/// Default entry cap for the embedding cache.
pub const DEFAULT_EMBED_CACHE_CAPACITY: u64 = 100_000;

/// In-memory embedding store keyed by text content hash.
pub struct EmbeddingCache {
    entries: Cache<String, Arc<Vec<f32>>>,
}

impl EmbeddingCache {
    /// Creates a cache with the default capacity.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EMBED_CACHE_CAPACITY)
    }

    /// Creates a cache with a max entry capacity (LRU eviction).
    #[inline]
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Returns the cached vector for a text, or `None` on a miss (never a
    /// zero vector).
    #[inline]
    pub fn get(&self, text: &str) -> Option<Arc<Vec<f32>>> {
        self.entries.get(&embedding_key(text))
    }

    /// Stores the vector for a text. Idempotent for a fixed (text, vector)
    /// pair.
    #[inline]
    pub fn put(&self, text: &str, vector: Vec<f32>) -> Arc<Vec<f32>> {
        let vector = Arc::new(vector);
        self.entries.insert(embedding_key(text), Arc::clone(&vector));
        vector
    }

    /// Returns `true` if a vector is cached for the text.
    #[inline]
    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(&embedding_key(text))
    }

    /// Returns the number of cached entries.
    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Returns `true` if the cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

/// The embedding step used by every tier: cache first, provider on miss.
///
/// Blank text is rejected before any I/O. The provider-call counter makes
/// deduplication observable in tests.
pub struct CachedEmbedder<E> {
    provider: E,
    cache: EmbeddingCache,
    provider_calls: AtomicU64,
}

impl<E: EmbeddingProvider> CachedEmbedder<E> {
    pub fn new(provider: E, cache: EmbeddingCache) -> Self {
        Self {
            provider,
            cache,
            provider_calls: AtomicU64::new(0),
        }
    }

    /// Embeds `text`, deduplicating provider calls by content hash.
    pub async fn embed(&self, text: &str) -> Result<Arc<Vec<f32>>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        if let Some(vector) = self.cache.get(text) {
            debug!(text_len = text.len(), "Embedding cache hit");
            return Ok(vector);
        }

        self.provider_calls.fetch_add(1, Ordering::Relaxed);
        let vector = self.provider.embed(text).await?;
        debug!(
            text_len = text.len(),
            dimension = vector.len(),
            "Embedding computed and cached"
        );

        Ok(self.cache.put(text, vector))
    }

    /// Number of provider calls made so far (cache hits excluded).
    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn provider(&self) -> &E {
        &self.provider
    }
}

impl<E> std::fmt::Debug for CachedEmbedder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbedder")
            .field("provider_calls", &self.provider_calls.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::mock::MockEmbedder;

    #[test]
    fn test_get_miss_returns_none() {
        let cache = EmbeddingCache::new();
        assert!(cache.get("never stored").is_none());
    }

    #[test]
    fn test_put_then_get_round_trips() {
        let cache = EmbeddingCache::new();
        let vector = vec![0.1, 0.2, 0.3];

        cache.put("some text", vector.clone());

        let cached = cache.get("some text").expect("entry should exist");
        assert_eq!(cached.as_slice(), vector.as_slice());
    }

    #[test]
    fn test_put_is_idempotent() {
        let cache = EmbeddingCache::new();
        cache.put("t", vec![1.0]);
        cache.put("t", vec![1.0]);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("t").unwrap().as_slice(), &[1.0]);
    }

    #[test]
    fn test_distinct_texts_distinct_entries() {
        let cache = EmbeddingCache::new();
        cache.put("a", vec![1.0]);
        cache.put("b", vec![2.0]);

        assert_eq!(cache.get("a").unwrap().as_slice(), &[1.0]);
        assert_eq!(cache.get("b").unwrap().as_slice(), &[2.0]);
    }

    #[tokio::test]
    async fn test_cached_embedder_dedupes_provider_calls() {
        let embedder = CachedEmbedder::new(MockEmbedder::new(8), EmbeddingCache::new());

        let first = embedder.embed("same question").await.unwrap();
        let second = embedder.embed("same question").await.unwrap();

        assert_eq!(first.as_slice(), second.as_slice());
        assert_eq!(embedder.provider_calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_embedder_rejects_blank_text() {
        let embedder = CachedEmbedder::new(MockEmbedder::new(8), EmbeddingCache::new());

        let err = embedder.embed("   ").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyText));
        assert_eq!(embedder.provider_calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_not_cached() {
        let provider = MockEmbedder::new(8);
        provider.fail_with("provider down");
        let embedder = CachedEmbedder::new(provider, EmbeddingCache::new());

        assert!(embedder.embed("q").await.is_err());
        assert!(embedder.cache().is_empty());

        embedder.provider().clear_failure();
        assert!(embedder.embed("q").await.is_ok());
    }
}

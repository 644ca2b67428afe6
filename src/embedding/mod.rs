//! Embedding provider seam and content-addressed embedding cache.
//!
//! The provider is a collaborator: this crate never computes embeddings
//! itself. Every tier embeds through [`CachedEmbedder`], which consults the
//! [`EmbeddingCache`] first, so at most one provider call is made per
//! distinct text per process lifetime.

pub mod cache;
pub mod error;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use cache::{CachedEmbedder, DEFAULT_EMBED_CACHE_CAPACITY, EmbeddingCache};
pub use error::EmbeddingError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbedder;

/// Computes an embedding vector for a text.
///
/// Failures are not retried within a request; the caller surfaces them.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;
}

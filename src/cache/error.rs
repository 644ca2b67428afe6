use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::IndexError;

#[derive(Debug, Error)]
/// Errors returned by the semantic QA cache.
pub enum CacheError {
    /// The question/query could not be embedded.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The underlying index failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::index::IndexError;

#[derive(Debug, Error)]
/// Errors returned by the grounding-document index.
pub enum GroundingError {
    /// The document/query could not be embedded.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The underlying index failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Convenience result type for document-index operations.
pub type GroundingResult<T> = Result<T, GroundingError>;

use thiserror::Error;

#[derive(Debug, Error)]
/// Errors from the embedding step.
pub enum EmbeddingError {
    /// Blank input, rejected before any I/O.
    #[error("cannot embed empty text")]
    EmptyText,

    /// The embedding provider call failed.
    #[error("embedding provider failed: {message}")]
    Provider {
        /// Error message.
        message: String,
    },
}

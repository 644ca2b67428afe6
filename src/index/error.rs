use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by vector index operations.
pub enum IndexError {
    /// The namespace has not been created.
    #[error("namespace not found: {namespace}")]
    NamespaceNotFound {
        /// Namespace name.
        namespace: String,
    },

    /// `ensure` was called with a spec incompatible with the existing
    /// namespace. Fatal configuration error; the namespace is never
    /// silently recreated.
    #[error("namespace '{namespace}' exists with an incompatible spec: {reason}")]
    NamespaceMismatch {
        /// Namespace name.
        namespace: String,
        /// What disagreed (dimension, metric, or schema).
        reason: String,
    },

    /// Vector length differs from the namespace dimension.
    #[error("dimension mismatch in '{namespace}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Namespace name.
        namespace: String,
        /// Namespace dimension.
        expected: usize,
        /// Offending vector length.
        actual: usize,
    },

    /// An attribute violated the namespace schema.
    #[error("schema violation in '{namespace}': {reason}")]
    SchemaViolation {
        /// Namespace name.
        namespace: String,
        /// Field-level detail.
        reason: String,
    },

    /// The underlying store is unreachable. Not produced by the in-process
    /// engine; surfaced by network-backed [`VectorStore`](super::VectorStore)
    /// implementations.
    #[error("index unavailable: {reason}")]
    Unavailable {
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

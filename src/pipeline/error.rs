use thiserror::Error;

use crate::cache::CacheError;
use crate::embedding::EmbeddingError;
use crate::generation::GenerationError;
use crate::grounding::GroundingError;
use crate::index::IndexError;

/// The pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Embed,
    CacheLookup,
    DocumentLookup,
    Retrieve,
    Generate,
    WriteBack,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Embed => "embed",
            Step::CacheLookup => "cache_lookup",
            Step::DocumentLookup => "document_lookup",
            Step::Retrieve => "retrieve",
            Step::Generate => "generate",
            Step::WriteBack => "write_back",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
/// The single structured failure a request can end in. No partial or
/// ambiguous success states are exposed: a request either returns an
/// [`Answer`](super::Answer) or one of these.
pub enum PipelineError {
    /// Blank query, rejected before any I/O.
    #[error("query is empty")]
    EmptyInput,

    /// The query could not be embedded; no cache was touched.
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Semantic cache lookup failed (and degrade-on-error is off).
    #[error("semantic cache lookup failed: {0}")]
    CacheLookup(#[from] CacheError),

    /// Document lookup failed (and degrade-on-error is off).
    #[error("document lookup failed: {0}")]
    DocumentLookup(#[from] GroundingError),

    /// Answer generation failed; nothing was cached.
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// Index configuration failed at setup.
    #[error("index setup failed: {0}")]
    Setup(#[from] IndexError),

    /// A step exceeded its deadline.
    #[error("step '{step}' timed out")]
    Timeout {
        /// The step that hit its deadline.
        step: Step,
    },
}

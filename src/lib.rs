//! Recall library crate: vector-indexed caching and grounded retrieval for
//! question answering.
//!
//! A query is answered by the cheapest sufficient source, in order: a
//! semantically similar previously answered question, documents already in
//! the grounding index, and only then external retrieval plus generation.
//! Every generated answer is written back so the next similar query is a
//! cache hit.
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`Config`], [`ConfigError`] - Environment-backed configuration
//! - [`VectorIndex`], [`VectorStore`] - Namespaced ANN index and its seam
//! - [`SemanticCache`], [`DocumentIndex`] - The two retrieval tiers
//! - [`Orchestrator`], [`Answer`], [`PipelineError`] - Request processing
//!
//! ## Embedding
//! - [`EmbeddingProvider`] - Collaborator seam for embedding models
//! - [`EmbeddingCache`], [`CachedEmbedder`] - Content-addressed dedup
//!
//! ## External Collaborators
//! - [`DocumentRetriever`], [`AnswerGenerator`] - Retrieval and generation
//!
//! ## Test/Mock Support
//! Mock collaborators are available behind the `mock` feature (and in
//! tests): [`MockEmbedder`], [`MockRetriever`], [`MockGenerator`].

pub mod cache;
pub mod config;
pub mod embedding;
pub mod generation;
pub mod grounding;
pub mod hashing;
pub mod index;
pub mod pipeline;
pub mod retrieval;

pub use cache::{
    CacheError, CacheResult, QA_ENTRY_TYPE, QaEntry, QaHit, QaMetadata, SEMANTIC_CACHE_NAMESPACE,
    SemanticCache, SemanticCacheConfig, qa_schema,
};
pub use config::{Config, ConfigError};
pub use embedding::{
    CachedEmbedder, DEFAULT_EMBED_CACHE_CAPACITY, EmbeddingCache, EmbeddingError,
    EmbeddingProvider,
};
#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbedder;
pub use generation::{AnswerGenerator, GenerationError};
#[cfg(any(test, feature = "mock"))]
pub use generation::MockGenerator;
pub use grounding::{
    DOCUMENT_ENTRY_TYPE, DOCUMENT_NAMESPACE, DocumentEntry, DocumentHit, DocumentIndex,
    DocumentIndexConfig, GroundingError, GroundingResult, document_schema,
};
pub use hashing::{EMBEDDING_KEY_PREFIX, embedding_key, hash_text};
pub use index::{
    AttributeValue, Attributes, DEFAULT_EF_CONSTRUCTION, DEFAULT_EF_RUNTIME, DEFAULT_M,
    DistanceMetric, FieldKind, FieldSpec, HnswParams, IndexError, IndexResult, IndexStats,
    IndexedRecord, NamespaceSpec, Schema, SearchHit, VectorIndex, VectorStore,
};
pub use pipeline::{
    Answer, AnswerSource, GroundingDocument, Orchestrator, PipelineConfig, PipelineError,
    RequestState, Step,
};
pub use retrieval::{DocumentRetriever, RetrievalError, RetrievedDocument};
#[cfg(any(test, feature = "mock"))]
pub use retrieval::MockRetriever;

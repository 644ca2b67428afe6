//! Request orchestration.
//!
//! One [`Orchestrator`] serves many concurrent requests; each request runs
//! its own state machine instance, so the only shared mutable state is the
//! underlying index store. The machine is an explicit tagged enum with one
//! transition method per state, so every fallback path is testable on its
//! own without driving a whole request.
//!
//! ```text
//! SemanticLookup ─hit──────────────────────────────▶ Returned(cache)
//!       │ miss
//!       ▼
//! DocumentLookup ─hit─▶ Generate(grounded) ─▶ WriteBack ─▶ Returned
//!       │ miss
//!       ▼
//! ExternalRetrieve ─docs─▶ Generate(external) ─▶ WriteBack ─▶ Returned
//!       │ none/error
//!       └───────▶ Generate(ungrounded) ─▶ WriteBack ─▶ Returned
//! ```
//!
//! Every non-cache-hit path writes the generated answer back into the
//! semantic cache, so the next similar query is a cache hit. A failed
//! request never writes anything.

pub mod error;


pub use error::{PipelineError, Step};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheError, QaMetadata, SemanticCache};
use crate::embedding::EmbeddingProvider;
use crate::generation::AnswerGenerator;
use crate::grounding::{DocumentHit, DocumentIndex, GroundingError};
use crate::index::VectorStore;
use crate::retrieval::{DocumentRetriever, RetrievedDocument};

/// Where a returned answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    /// A previously answered similar question.
    Cache,
    /// Generated over documents already in the grounding index.
    Grounded,
    /// Generated over externally retrieved documents.
    External,
    /// Generated with no supporting documents at all.
    Ungrounded,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Cache => "cache",
            AnswerSource::Grounded => "grounded",
            AnswerSource::External => "external",
            AnswerSource::Ungrounded => "ungrounded",
        }
    }
}

/// The result of a successful request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
    /// The cached question that matched, on the cache-hit path.
    pub matched_question: Option<String>,
    /// Its similarity to the query, on the cache-hit path.
    pub similarity: Option<f32>,
}

/// A document handed to the generator as supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingDocument {
    pub text: String,
    pub source_url: Option<String>,
    /// Similarity to the query when the document came from the index.
    pub similarity: Option<f32>,
}

impl From<DocumentHit> for GroundingDocument {
    fn from(hit: DocumentHit) -> Self {
        Self {
            text: hit.text,
            source_url: hit.source_url,
            similarity: Some(hit.similarity),
        }
    }
}

impl From<RetrievedDocument> for GroundingDocument {
    fn from(doc: RetrievedDocument) -> Self {
        Self {
            text: doc.content,
            source_url: Some(doc.source_url),
            similarity: None,
        }
    }
}

/// Policy and deadline configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum similarity for a cached answer to count as a hit.
    ///
    /// Deliberately low by default: the metric gives no fixed notion of
    /// "same question", so this is a per-deployment tuning knob, not a
    /// built-in correctness boundary.
    pub cache_score_threshold: f32,
    /// Minimum similarity for a grounding document to qualify.
    pub document_score_threshold: f32,
    pub cache_top_k: usize,
    pub document_top_k: usize,
    /// Max documents handed to the generator.
    pub max_grounding_docs: usize,
    /// Max characters of each document handed to the generator.
    pub max_document_chars: usize,
    pub embed_timeout: Duration,
    pub lookup_timeout: Duration,
    pub retrieve_timeout: Duration,
    pub generate_timeout: Duration,
    /// Treat a failed or timed-out cache/document lookup as a miss instead
    /// of failing the request.
    pub degrade_on_lookup_error: bool,
    /// Write externally retrieved documents into the grounding index so
    /// later queries can be grounded without retrieval.
    pub index_retrieved_documents: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_score_threshold: 0.05,
            document_score_threshold: 0.4,
            cache_top_k: 5,
            document_top_k: 3,
            max_grounding_docs: 3,
            max_document_chars: 5_000,
            embed_timeout: Duration::from_secs(10),
            lookup_timeout: Duration::from_secs(10),
            retrieve_timeout: Duration::from_secs(30),
            generate_timeout: Duration::from_secs(60),
            degrade_on_lookup_error: false,
            index_retrieved_documents: true,
        }
    }
}

/// The request state machine. Transitions only ever move downward through
/// the fallback chain; `Returned` and `Failed` are terminal.
#[derive(Debug)]
pub enum RequestState {
    SemanticLookup,
    DocumentLookup,
    ExternalRetrieve,
    Generate {
        docs: Vec<GroundingDocument>,
        provenance: AnswerSource,
    },
    WriteBack {
        answer: Answer,
    },
    Returned(Answer),
    Failed(PipelineError),
}

/// Sequences the semantic cache, the document index, and the external
/// collaborators for each request.
pub struct Orchestrator<S, E, R, G> {
    semantic: Arc<SemanticCache<S, E>>,
    documents: Arc<DocumentIndex<S, E>>,
    retriever: R,
    generator: G,
    config: PipelineConfig,
}

impl<S, E, R, G> Orchestrator<S, E, R, G>
where
    S: VectorStore,
    E: EmbeddingProvider,
    R: DocumentRetriever,
    G: AnswerGenerator,
{
    pub fn new(
        semantic: Arc<SemanticCache<S, E>>,
        documents: Arc<DocumentIndex<S, E>>,
        retriever: R,
        generator: G,
        config: PipelineConfig,
    ) -> Self {
        Self {
            semantic,
            documents,
            retriever,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn semantic(&self) -> &SemanticCache<S, E> {
        &self.semantic
    }

    pub fn documents(&self) -> &DocumentIndex<S, E> {
        &self.documents
    }

    /// Creates both namespaces (idempotent, safe to race). A spec mismatch
    /// against an existing namespace is a fatal setup error.
    pub async fn ensure(&self) -> Result<(), PipelineError> {
        self.semantic.ensure().await.map_err(|e| match e {
            CacheError::Index(index_error) => PipelineError::Setup(index_error),
            other => PipelineError::CacheLookup(other),
        })?;
        self.documents.ensure().await.map_err(|e| match e {
            GroundingError::Index(index_error) => PipelineError::Setup(index_error),
            other => PipelineError::DocumentLookup(other),
        })?;
        Ok(())
    }

    /// Answers one query, driving the state machine to a terminal state.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn answer(&self, query: &str) -> Result<Answer, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let mut state = RequestState::SemanticLookup;
        loop {
            state = match state {
                RequestState::SemanticLookup => self.semantic_lookup(query).await,
                RequestState::DocumentLookup => self.document_lookup(query).await,
                RequestState::ExternalRetrieve => self.external_retrieve(query).await,
                RequestState::Generate { docs, provenance } => {
                    self.generate(query, docs, provenance).await
                }
                RequestState::WriteBack { answer } => self.write_back(query, answer).await,
                RequestState::Returned(answer) => {
                    info!(source = answer.source.as_str(), "Request returned");
                    return Ok(answer);
                }
                RequestState::Failed(error) => {
                    warn!(error = %error, "Request failed");
                    return Err(error);
                }
            };
        }
    }

    /// Embeds the query and checks the semantic cache. This is the only
    /// step that can call the embedding provider; every later step reuses
    /// the cached vector.
    pub async fn semantic_lookup(&self, query: &str) -> RequestState {
        // Embedding failures never degrade: a request that cannot be
        // embedded cannot proceed to any lookup or write-back.
        let embedded = tokio::time::timeout(
            self.config.embed_timeout,
            self.semantic.embedder().embed(query),
        )
        .await;
        match embedded {
            Err(_) => return RequestState::Failed(PipelineError::Timeout { step: Step::Embed }),
            Ok(Err(e)) => return RequestState::Failed(PipelineError::Embedding(e)),
            Ok(Ok(_)) => {}
        }

        let lookup = tokio::time::timeout(
            self.config.lookup_timeout,
            self.semantic.search(
                query,
                self.config.cache_top_k,
                self.config.cache_score_threshold,
            ),
        )
        .await;

        match lookup {
            Ok(Ok(hits)) => {
                // Hits arrive sorted best-first; the single highest
                // similarity wins.
                if let Some(best) = hits.into_iter().next() {
                    debug!(similarity = best.similarity, "Semantic cache hit");
                    RequestState::Returned(Answer {
                        text: best.answer,
                        source: AnswerSource::Cache,
                        matched_question: Some(best.question),
                        similarity: Some(best.similarity),
                    })
                } else {
                    debug!("Semantic cache miss");
                    RequestState::DocumentLookup
                }
            }
            Ok(Err(e)) => self.lookup_failure(Step::CacheLookup, PipelineError::CacheLookup(e)),
            Err(_) => self.lookup_failure(
                Step::CacheLookup,
                PipelineError::Timeout {
                    step: Step::CacheLookup,
                },
            ),
        }
    }

    /// Searches the grounding index for supporting documents.
    pub async fn document_lookup(&self, query: &str) -> RequestState {
        let lookup = tokio::time::timeout(
            self.config.lookup_timeout,
            self.documents.search(
                query,
                self.config.document_top_k,
                self.config.document_score_threshold,
            ),
        )
        .await;

        match lookup {
            Ok(Ok(hits)) if !hits.is_empty() => {
                debug!(documents = hits.len(), "Grounding documents found");
                RequestState::Generate {
                    docs: hits.into_iter().map(GroundingDocument::from).collect(),
                    provenance: AnswerSource::Grounded,
                }
            }
            Ok(Ok(_)) => {
                debug!("No grounding documents");
                RequestState::ExternalRetrieve
            }
            Ok(Err(e)) => {
                self.lookup_failure(Step::DocumentLookup, PipelineError::DocumentLookup(e))
            }
            Err(_) => self.lookup_failure(
                Step::DocumentLookup,
                PipelineError::Timeout {
                    step: Step::DocumentLookup,
                },
            ),
        }
    }

    /// Delegates to the external retriever. Retrieval is best-effort:
    /// failures and empty results both fall through to ungrounded
    /// generation rather than failing the request.
    pub async fn external_retrieve(&self, query: &str) -> RequestState {
        let retrieved =
            tokio::time::timeout(self.config.retrieve_timeout, self.retriever.retrieve(query))
                .await;

        match retrieved {
            Ok(Ok(docs)) if !docs.is_empty() => {
                info!(documents = docs.len(), "External retrieval succeeded");

                if self.config.index_retrieved_documents {
                    let stored = self.documents.add_retrieved(&docs).await;
                    debug!(stored = stored, "Retrieved documents indexed");
                }

                RequestState::Generate {
                    docs: docs.into_iter().map(GroundingDocument::from).collect(),
                    provenance: AnswerSource::External,
                }
            }
            Ok(Ok(_)) => {
                warn!("External retrieval returned no documents; generating ungrounded");
                RequestState::Generate {
                    docs: Vec::new(),
                    provenance: AnswerSource::Ungrounded,
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "External retrieval failed; generating ungrounded");
                RequestState::Generate {
                    docs: Vec::new(),
                    provenance: AnswerSource::Ungrounded,
                }
            }
            Err(_) => {
                warn!("External retrieval timed out; generating ungrounded");
                RequestState::Generate {
                    docs: Vec::new(),
                    provenance: AnswerSource::Ungrounded,
                }
            }
        }
    }

    /// Calls the generator over the capped, truncated document pool. A
    /// generation failure fails the request before anything is cached.
    pub async fn generate(
        &self,
        query: &str,
        mut docs: Vec<GroundingDocument>,
        provenance: AnswerSource,
    ) -> RequestState {
        docs.truncate(self.config.max_grounding_docs);
        for doc in &mut docs {
            truncate_chars(&mut doc.text, self.config.max_document_chars);
        }

        let generated = tokio::time::timeout(
            self.config.generate_timeout,
            self.generator.generate(query, &docs),
        )
        .await;

        match generated {
            Ok(Ok(text)) => RequestState::WriteBack {
                answer: Answer {
                    text,
                    source: provenance,
                    matched_question: None,
                    similarity: None,
                },
            },
            Ok(Err(e)) => RequestState::Failed(PipelineError::Generation(e)),
            Err(_) => RequestState::Failed(PipelineError::Timeout {
                step: Step::Generate,
            }),
        }
    }

    /// Writes the generated answer back into the semantic cache. The
    /// answer was already produced, so caching is best-effort: failures
    /// are logged and the request still returns.
    pub async fn write_back(&self, query: &str, answer: Answer) -> RequestState {
        let metadata = QaMetadata::from_source(answer.source.as_str());
        let saved = tokio::time::timeout(
            self.config.lookup_timeout,
            self.semantic.save(query, &answer.text, metadata),
        )
        .await;

        match saved {
            Ok(Ok(id)) => debug!(id = %id, "Answer written back to semantic cache"),
            Ok(Err(e)) => warn!(error = %e, "Write-back failed; returning answer anyway"),
            Err(_) => warn!("Write-back timed out; returning answer anyway"),
        }

        RequestState::Returned(answer)
    }

    fn lookup_failure(&self, step: Step, error: PipelineError) -> RequestState {
        if self.config.degrade_on_lookup_error {
            warn!(step = %step, error = %error, "Lookup failed; degrading to miss");
            match step {
                Step::CacheLookup => RequestState::DocumentLookup,
                _ => RequestState::ExternalRetrieve,
            }
        } else {
            RequestState::Failed(error)
        }
    }
}

impl<S, E, R, G> std::fmt::Debug for Orchestrator<S, E, R, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// In-place char-boundary-safe truncation.
fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((byte_index, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_index);
    }
}

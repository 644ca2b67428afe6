//! Grounding-document index.
//!
//! Same mechanics as the semantic QA cache, namespaced for supporting
//! text: each entry embeds a document body and carries its source URL, and
//! searches return evidence for answer generation before any external
//! retrieval is attempted.

pub mod error;


pub use error::{GroundingError, GroundingResult};

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::embedding::{CachedEmbedder, EmbeddingProvider};
use crate::index::{
    AttributeValue, Attributes, DistanceMetric, FieldSpec, HnswParams, IndexedRecord,
    NamespaceSpec, Schema, VectorStore,
};
use crate::retrieval::RetrievedDocument;

/// Default namespace for grounding documents.
pub const DOCUMENT_NAMESPACE: &str = "document_index";

/// `type` attribute stamped on every document entry.
pub const DOCUMENT_ENTRY_TYPE: &str = "document";

const ATTR_TEXT: &str = "text";
const ATTR_SOURCE_URL: &str = "source_url";
const ATTR_TYPE: &str = "type";
const ATTR_TIMESTAMP: &str = "timestamp";

/// Attribute schema of the document namespace.
pub fn document_schema() -> Schema {
    Schema::new([
        FieldSpec::text(ATTR_TEXT),
        FieldSpec::text(ATTR_SOURCE_URL),
        FieldSpec::text(ATTR_TYPE),
        FieldSpec::number(ATTR_TIMESTAMP),
    ])
}

/// Namespace configuration for the document tier.
#[derive(Debug, Clone)]
pub struct DocumentIndexConfig {
    pub namespace: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub hnsw: HnswParams,
}

impl DocumentIndexConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            namespace: DOCUMENT_NAMESPACE.to_string(),
            dimension,
            metric: DistanceMetric::Cosine,
            hnsw: HnswParams::default(),
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }
}

/// One grounding document matched by a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentHit {
    pub id: String,
    pub text: String,
    pub source_url: Option<String>,
    pub similarity: f32,
    pub created_at: i64,
}

/// One stored document, as returned by the administrative listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub id: String,
    pub text: String,
    pub source_url: Option<String>,
    pub created_at: i64,
}

/// Grounding-document store over one [`VectorStore`] namespace.
pub struct DocumentIndex<S, E> {
    store: Arc<S>,
    embedder: Arc<CachedEmbedder<E>>,
    config: DocumentIndexConfig,
}

impl<S: VectorStore, E: EmbeddingProvider> DocumentIndex<S, E> {
    pub fn new(
        store: Arc<S>,
        embedder: Arc<CachedEmbedder<E>>,
        config: DocumentIndexConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &DocumentIndexConfig {
        &self.config
    }

    /// Creates the document namespace if missing; validates it otherwise.
    pub async fn ensure(&self) -> GroundingResult<()> {
        let spec = NamespaceSpec::new(
            self.config.namespace.clone(),
            self.config.dimension,
            self.config.metric,
            document_schema(),
        );
        self.store.ensure(spec, self.config.hnsw).await?;
        Ok(())
    }

    /// Indexes one document body under a fresh id.
    #[instrument(skip(self, text, source_url), fields(text_len = text.len()))]
    pub async fn add_document(
        &self,
        text: &str,
        source_url: Option<&str>,
    ) -> GroundingResult<String> {
        let embedding = self.embedder.embed(text).await?;

        let id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().timestamp_millis();

        let mut attributes = Attributes::new();
        attributes.insert(ATTR_TEXT.into(), text.into());
        if let Some(url) = source_url {
            attributes.insert(ATTR_SOURCE_URL.into(), url.into());
        }
        attributes.insert(ATTR_TYPE.into(), DOCUMENT_ENTRY_TYPE.into());
        attributes.insert(ATTR_TIMESTAMP.into(), AttributeValue::Number(timestamp as f64));

        let record = IndexedRecord::new(id.clone(), embedding.as_ref().clone(), attributes);
        self.store.add(&self.config.namespace, record).await?;

        debug!(id = %id, "Document indexed");
        Ok(id)
    }

    /// Indexes externally retrieved documents, best-effort and
    /// concurrently. Failures are logged per document, never propagated;
    /// returns how many documents were indexed.
    pub async fn add_retrieved(&self, documents: &[RetrievedDocument]) -> usize {
        let inserts = documents
            .iter()
            .map(|doc| self.add_document(&doc.content, Some(doc.source_url.as_str())));

        let mut stored = 0;
        for (doc, result) in documents.iter().zip(join_all(inserts).await) {
            match result {
                Ok(_) => stored += 1,
                Err(e) => {
                    warn!(source_url = %doc.source_url, error = %e, "Failed to index retrieved document");
                }
            }
        }
        stored
    }

    /// Finds documents similar to `query`.
    #[instrument(skip(self, query), fields(query_len = query.len(), top_k = top_k))]
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> GroundingResult<Vec<DocumentHit>> {
        let embedding = self.embedder.embed(query).await?;

        let hits = self
            .store
            .search(&self.config.namespace, &embedding, top_k, score_threshold)
            .await?;

        debug!(hits = hits.len(), "Document search complete");

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let text = hit.record.attributes.get(ATTR_TEXT)?.as_text()?.to_string();
                let source_url = hit
                    .record
                    .attributes
                    .get(ATTR_SOURCE_URL)
                    .and_then(|v| v.as_text())
                    .map(str::to_string);
                Some(DocumentHit {
                    id: hit.id,
                    text,
                    source_url,
                    similarity: hit.similarity,
                    created_at: hit.record.created_at,
                })
            })
            .collect())
    }

    /// Lists every stored document (administrative).
    pub async fn documents(&self) -> GroundingResult<Vec<DocumentEntry>> {
        let records = self.store.records(&self.config.namespace).await?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let text = record.attributes.get(ATTR_TEXT)?.as_text()?.to_string();
                let source_url = record
                    .attributes
                    .get(ATTR_SOURCE_URL)
                    .and_then(|v| v.as_text())
                    .map(str::to_string);
                Some(DocumentEntry {
                    id: record.id,
                    text,
                    source_url,
                    created_at: record.created_at,
                })
            })
            .collect())
    }

    /// Deletes one document by id (administrative); returns whether it
    /// existed.
    pub async fn remove(&self, id: &str) -> GroundingResult<bool> {
        Ok(self.store.delete(&self.config.namespace, id).await?)
    }
}

impl<S, E> std::fmt::Debug for DocumentIndex<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("namespace", &self.config.namespace)
            .field("dimension", &self.config.dimension)
            .finish_non_exhaustive()
    }
}

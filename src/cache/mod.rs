//! Semantic question/answer cache.
//!
//! A write-only QA store on its own index namespace: `save` records a
//! question embedding with the answer as an attribute, `search` answers a
//! new query by similarity to previously answered questions. Entries are
//! never mutated; only administrative [`SemanticCache::remove`] deletes.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::{CacheError, CacheResult};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::embedding::{CachedEmbedder, EmbeddingProvider};
use crate::index::{
    AttributeValue, Attributes, DistanceMetric, FieldSpec, HnswParams, IndexedRecord,
    NamespaceSpec, Schema, VectorStore,
};

/// Default namespace for QA entries.
pub const SEMANTIC_CACHE_NAMESPACE: &str = "semantic_cache_index";

/// `type` attribute stamped on every QA entry.
pub const QA_ENTRY_TYPE: &str = "semantic_cache";

const ATTR_QUESTION: &str = "question";
const ATTR_ANSWER: &str = "answer";
const ATTR_TYPE: &str = "type";
const ATTR_SOURCE: &str = "source";
const ATTR_TIMESTAMP: &str = "timestamp";

/// Attribute schema of the QA namespace.
pub fn qa_schema() -> Schema {
    Schema::new([
        FieldSpec::text(ATTR_QUESTION),
        FieldSpec::text(ATTR_ANSWER),
        FieldSpec::text(ATTR_TYPE),
        FieldSpec::text(ATTR_SOURCE),
        FieldSpec::number(ATTR_TIMESTAMP),
    ])
}

/// Namespace configuration for the QA tier.
#[derive(Debug, Clone)]
pub struct SemanticCacheConfig {
    pub namespace: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub hnsw: HnswParams,
}

impl SemanticCacheConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            namespace: SEMANTIC_CACHE_NAMESPACE.to_string(),
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

/// Provenance metadata stored with a QA entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaMetadata {
    /// Where the answer came from (e.g. `grounded`, `external`).
    pub source: String,
    /// Epoch milliseconds; `None` stamps the current time.
    pub timestamp: Option<i64>,
}

impl QaMetadata {
    pub fn from_source(source: &str) -> Self {
        Self {
            source: source.to_string(),
            timestamp: None,
        }
    }
}

/// One cached QA pair matched by a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaHit {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub similarity: f32,
    pub source: Option<String>,
    pub created_at: i64,
}

/// One stored QA pair, as returned by the administrative listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub source: Option<String>,
    pub created_at: i64,
}

/// Semantic QA cache over one [`VectorStore`] namespace.
pub struct SemanticCache<S, E> {
    store: Arc<S>,
    embedder: Arc<CachedEmbedder<E>>,
    config: SemanticCacheConfig,
}

impl<S: VectorStore, E: EmbeddingProvider> SemanticCache<S, E> {
    pub fn new(store: Arc<S>, embedder: Arc<CachedEmbedder<E>>, config: SemanticCacheConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &SemanticCacheConfig {
        &self.config
    }

    pub fn embedder(&self) -> &CachedEmbedder<E> {
        &self.embedder
    }

    /// Creates the QA namespace if missing; validates it otherwise.
    pub async fn ensure(&self) -> CacheResult<()> {
        let spec = NamespaceSpec::new(
            self.config.namespace.clone(),
            self.config.dimension,
            self.config.metric,
            qa_schema(),
        );
        self.store.ensure(spec, self.config.hnsw).await?;
        Ok(())
    }

    /// Stores a freshly answered question. Write-only: a new entry with a
    /// generated id is created every time; existing entries are never
    /// touched. The stored vector is the embedding of `question`, never of
    /// the answer.
    #[instrument(skip(self, question, answer, metadata), fields(question_len = question.len()))]
    pub async fn save(
        &self,
        question: &str,
        answer: &str,
        metadata: QaMetadata,
    ) -> CacheResult<String> {
        let embedding = self.embedder.embed(question).await?;

        let id = Uuid::new_v4().to_string();
        let timestamp = metadata
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        let mut attributes = Attributes::new();
        attributes.insert(ATTR_QUESTION.into(), question.into());
        attributes.insert(ATTR_ANSWER.into(), answer.into());
        attributes.insert(ATTR_TYPE.into(), QA_ENTRY_TYPE.into());
        attributes.insert(ATTR_SOURCE.into(), metadata.source.as_str().into());
        attributes.insert(ATTR_TIMESTAMP.into(), AttributeValue::Number(timestamp as f64));

        let record = IndexedRecord::new(id.clone(), embedding.as_ref().clone(), attributes);
        self.store.add(&self.config.namespace, record).await?;

        info!(id = %id, "QA pair cached");
        Ok(id)
    }

    /// Finds previously answered questions similar to `query`.
    ///
    /// `score_threshold` is a policy knob, not a correctness boundary: the
    /// metric is not normalized against any fixed notion of "same
    /// question", so the operating point is tuned per deployment (see
    /// [`crate::config::Config::cache_score_threshold`]).
    #[instrument(skip(self, query), fields(query_len = query.len(), top_k = top_k))]
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        score_threshold: f32,
    ) -> CacheResult<Vec<QaHit>> {
        let embedding = self.embedder.embed(query).await?;

        let hits = self
            .store
            .search(&self.config.namespace, &embedding, top_k, score_threshold)
            .await?;

        debug!(hits = hits.len(), "Semantic cache search complete");

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let question = hit.record.attributes.get(ATTR_QUESTION)?.as_text()?.to_string();
                let answer = hit.record.attributes.get(ATTR_ANSWER)?.as_text()?.to_string();
                let source = hit
                    .record
                    .attributes
                    .get(ATTR_SOURCE)
                    .and_then(|v| v.as_text())
                    .map(str::to_string);
                Some(QaHit {
                    id: hit.id,
                    question,
                    answer,
                    similarity: hit.similarity,
                    source,
                    created_at: hit.record.created_at,
                })
            })
            .collect())
    }

    /// Lists every cached QA pair (administrative).
    pub async fn entries(&self) -> CacheResult<Vec<QaEntry>> {
        let records = self.store.records(&self.config.namespace).await?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let question = record.attributes.get(ATTR_QUESTION)?.as_text()?.to_string();
                let answer = record.attributes.get(ATTR_ANSWER)?.as_text()?.to_string();
                let source = record
                    .attributes
                    .get(ATTR_SOURCE)
                    .and_then(|v| v.as_text())
                    .map(str::to_string);
                Some(QaEntry {
                    id: record.id,
                    question,
                    answer,
                    source,
                    created_at: record.created_at,
                })
            })
            .collect())
    }

    /// Deletes one entry by id (administrative); returns whether it existed.
    pub async fn remove(&self, id: &str) -> CacheResult<bool> {
        Ok(self.store.delete(&self.config.namespace, id).await?)
    }
}

impl<S, E> std::fmt::Debug for SemanticCache<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("namespace", &self.config.namespace)
            .field("dimension", &self.config.dimension)
            .finish_non_exhaustive()
    }
}

//! Namespaced approximate-nearest-neighbor index.
//!
//! A [`VectorIndex`] holds any number of namespaces, each with a fixed
//! vector dimension, a distance metric, a typed attribute schema, and its
//! own HNSW graph. Higher tiers reach the index through the [`VectorStore`]
//! trait so they can be exercised against fakes.
//!
//! Records are independently keyed, so concurrent `add`/`search`/`delete`
//! on one namespace need no external locking; [`VectorIndex::ensure`] is
//! the single once-only initialization barrier.

pub mod error;
mod hnsw;
pub mod model;
pub mod schema;

#[cfg(test)]
mod tests;

pub use error::{IndexError, IndexResult};
pub use hnsw::{DEFAULT_EF_CONSTRUCTION, DEFAULT_EF_RUNTIME, DEFAULT_M, HnswParams};
pub use model::{
    AttributeValue, Attributes, DistanceMetric, IndexStats, IndexedRecord, NamespaceSpec,
    SearchHit,
};
pub use schema::{FieldKind, FieldSpec, Schema, SchemaCheck};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::{debug, instrument};

use hnsw::HnswGraph;

/// Async interface to a vector store, used by the semantic-cache and
/// document tiers. Implemented by the in-process [`VectorIndex`]; a
/// network-backed store would implement the same surface.
pub trait VectorStore: Send + Sync {
    /// Creates the namespace if absent; validates compatibility if present.
    fn ensure(
        &self,
        spec: NamespaceSpec,
        params: HnswParams,
    ) -> impl Future<Output = IndexResult<()>> + Send;

    /// Inserts or overwrites a record.
    fn add(
        &self,
        namespace: &str,
        record: IndexedRecord,
    ) -> impl Future<Output = IndexResult<()>> + Send;

    /// Top-k similarity search with a score threshold.
    fn search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> impl Future<Output = IndexResult<Vec<SearchHit>>> + Send;

    /// Removes a record; returns whether it existed.
    fn delete(&self, namespace: &str, id: &str) -> impl Future<Output = IndexResult<bool>> + Send;

    /// Lists all live records (administrative).
    fn records(&self, namespace: &str) -> impl Future<Output = IndexResult<Vec<IndexedRecord>>> + Send;
}

struct Namespace {
    spec: NamespaceSpec,
    ef_runtime: AtomicUsize,
    graph: RwLock<HnswGraph>,
}

/// In-process vector index.
#[derive(Default)]
pub struct VectorIndex {
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace(&self, name: &str) -> IndexResult<Arc<Namespace>> {
        self.namespaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| IndexError::NamespaceNotFound {
                namespace: name.to_string(),
            })
    }

    /// Creates the namespace if absent. If it already exists, the given
    /// spec must agree with the existing one; a mismatch is fatal and the
    /// namespace is left untouched.
    ///
    /// Safe to call concurrently: first caller in wins, the rest validate.
    #[instrument(skip(self, spec, params), fields(namespace = %spec.name))]
    pub fn ensure(&self, spec: NamespaceSpec, params: HnswParams) -> IndexResult<()> {
        let mut namespaces = self.namespaces.write();

        if let Some(existing) = namespaces.get(&spec.name) {
            return check_compatible(&existing.spec, &spec);
        }

        debug!(
            dimension = spec.dimension,
            metric = spec.metric.as_str(),
            m = params.m,
            ef_construction = params.ef_construction,
            "Creating namespace"
        );

        let graph = HnswGraph::new(spec.metric, params);
        namespaces.insert(
            spec.name.clone(),
            Arc::new(Namespace {
                spec,
                ef_runtime: AtomicUsize::new(params.ef_runtime.max(1)),
                graph: RwLock::new(graph),
            }),
        );

        Ok(())
    }

    /// Inserts or overwrites `record` (last write wins per id). Fails
    /// without mutating anything if the vector length or an attribute
    /// disagrees with the namespace declaration.
    #[instrument(skip(self, record), fields(namespace = namespace, id = %record.id))]
    pub fn add(&self, namespace: &str, record: IndexedRecord) -> IndexResult<()> {
        let ns = self.namespace(namespace)?;

        if record.vector.len() != ns.spec.dimension {
            return Err(IndexError::DimensionMismatch {
                namespace: namespace.to_string(),
                expected: ns.spec.dimension,
                actual: record.vector.len(),
            });
        }

        ns.spec
            .schema
            .check(&record.attributes)
            .map_err(|check| IndexError::SchemaViolation {
                namespace: namespace.to_string(),
                reason: check.to_string(),
            })?;

        ns.graph.write().insert(record);
        Ok(())
    }

    /// Returns up to `top_k` hits with `similarity >= score_threshold`,
    /// sorted descending by similarity, ties broken by most recent
    /// `created_at`. No qualifying match is an empty result, not an error.
    #[instrument(skip(self, query), fields(namespace = namespace, top_k = top_k))]
    pub fn search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> IndexResult<Vec<SearchHit>> {
        let ns = self.namespace(namespace)?;

        if query.len() != ns.spec.dimension {
            return Err(IndexError::DimensionMismatch {
                namespace: namespace.to_string(),
                expected: ns.spec.dimension,
                actual: query.len(),
            });
        }

        let ef = ns.ef_runtime.load(Ordering::Relaxed).max(top_k);
        let graph = ns.graph.read();

        let mut hits: Vec<SearchHit> = graph
            .search(query, ef)
            .into_iter()
            .map(|(record, distance)| SearchHit {
                id: record.id.clone(),
                similarity: ns.spec.metric.similarity_from_distance(distance),
                record: record.clone(),
            })
            .filter(|hit| hit.similarity >= score_threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        });
        hits.truncate(top_k);

        debug!(hits = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Removes a record; returns whether a live record existed.
    #[instrument(skip(self), fields(namespace = namespace, id = id))]
    pub fn delete(&self, namespace: &str, id: &str) -> IndexResult<bool> {
        let ns = self.namespace(namespace)?;
        let removed = ns.graph.write().remove(id);
        Ok(removed)
    }

    /// Fetches one record by id.
    pub fn get(&self, namespace: &str, id: &str) -> IndexResult<Option<IndexedRecord>> {
        let ns = self.namespace(namespace)?;
        let graph = ns.graph.read();
        Ok(graph.get(id).cloned())
    }

    /// Lists all live records (administrative; not a ranked search).
    pub fn records(&self, namespace: &str) -> IndexResult<Vec<IndexedRecord>> {
        let ns = self.namespace(namespace)?;
        let graph = ns.graph.read();
        Ok(graph.records().cloned().collect())
    }

    /// Adjusts query-time search breadth without rebuilding the graph.
    pub fn set_ef_runtime(&self, namespace: &str, ef_runtime: usize) -> IndexResult<()> {
        let ns = self.namespace(namespace)?;
        ns.ef_runtime.store(ef_runtime.max(1), Ordering::Relaxed);
        Ok(())
    }

    /// Point-in-time counters for a namespace.
    pub fn stats(&self, namespace: &str) -> IndexResult<IndexStats> {
        let ns = self.namespace(namespace)?;
        let graph = ns.graph.read();
        Ok(IndexStats {
            records: graph.len(),
            tombstones: graph.tombstones(),
            dimension: ns.spec.dimension,
            metric: ns.spec.metric,
            max_level: graph.max_level(),
        })
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("namespaces", &self.namespaces.read().len())
            .finish()
    }
}

fn check_compatible(existing: &NamespaceSpec, requested: &NamespaceSpec) -> IndexResult<()> {
    if existing.dimension != requested.dimension {
        return Err(IndexError::NamespaceMismatch {
            namespace: requested.name.clone(),
            reason: format!(
                "dimension {} != requested {}",
                existing.dimension, requested.dimension
            ),
        });
    }
    if existing.metric != requested.metric {
        return Err(IndexError::NamespaceMismatch {
            namespace: requested.name.clone(),
            reason: format!(
                "metric {} != requested {}",
                existing.metric.as_str(),
                requested.metric.as_str()
            ),
        });
    }
    if existing.schema != requested.schema {
        return Err(IndexError::NamespaceMismatch {
            namespace: requested.name.clone(),
            reason: "schema differs from the existing declaration".to_string(),
        });
    }
    Ok(())
}

impl VectorStore for VectorIndex {
    async fn ensure(&self, spec: NamespaceSpec, params: HnswParams) -> IndexResult<()> {
        VectorIndex::ensure(self, spec, params)
    }

    async fn add(&self, namespace: &str, record: IndexedRecord) -> IndexResult<()> {
        VectorIndex::add(self, namespace, record)
    }

    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
        score_threshold: f32,
    ) -> IndexResult<Vec<SearchHit>> {
        VectorIndex::search(self, namespace, query, top_k, score_threshold)
    }

    async fn delete(&self, namespace: &str, id: &str) -> IndexResult<bool> {
        VectorIndex::delete(self, namespace, id)
    }

    async fn records(&self, namespace: &str) -> IndexResult<Vec<IndexedRecord>> {
        VectorIndex::records(self, namespace)
    }
}

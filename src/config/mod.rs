//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `RECALL_*` environment
//! variables via [`Config::from_env`].

pub mod error;


pub use error::ConfigError;

use std::env;
use std::time::Duration;

use crate::cache::{SEMANTIC_CACHE_NAMESPACE, SemanticCacheConfig};
use crate::embedding::cache::DEFAULT_EMBED_CACHE_CAPACITY;
use crate::grounding::{DOCUMENT_NAMESPACE, DocumentIndexConfig};
use crate::index::{
    DEFAULT_EF_CONSTRUCTION, DEFAULT_EF_RUNTIME, DEFAULT_M, DistanceMetric, HnswParams,
};
use crate::pipeline::PipelineConfig;

/// Library configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace for QA entries. Default: `semantic_cache_index`.
    pub semantic_cache_namespace: String,

    /// Namespace for grounding documents. Default: `document_index`.
    pub document_namespace: String,

    /// Embedding dimension shared by both namespaces. Default: `1536`.
    pub dimension: usize,

    /// Distance metric. Default: cosine.
    pub metric: DistanceMetric,

    /// HNSW max neighbors per node. Default: `16`.
    pub hnsw_m: usize,

    /// HNSW build-time search breadth. Default: `200`.
    pub hnsw_ef_construction: usize,

    /// HNSW query-time search breadth. Default: `10`.
    pub hnsw_ef_runtime: usize,

    /// Similarity at or above which a cached answer is a hit.
    ///
    /// Deliberately low by default (0.05): the metric carries no calibrated
    /// notion of "same question", so this is a deployment policy knob
    /// rather than a built-in correctness boundary.
    pub cache_score_threshold: f32,

    /// Similarity at or above which a document qualifies as grounding.
    /// Default: `0.4`. Independent of the cache threshold; tune both per
    /// deployment.
    pub document_score_threshold: f32,

    /// Max QA candidates fetched per lookup. Default: `5`.
    pub cache_top_k: usize,

    /// Max documents fetched per lookup. Default: `3`.
    pub document_top_k: usize,

    /// Max documents handed to the generator. Default: `3`.
    pub max_grounding_docs: usize,

    /// Max characters per document handed to the generator. Default: `5000`.
    pub max_document_chars: usize,

    /// Deadline for one embedding call. Default: 10s.
    pub embed_timeout: Duration,

    /// Deadline for one cache/document lookup or write-back. Default: 10s.
    pub lookup_timeout: Duration,

    /// Deadline for external retrieval. Default: 30s.
    pub retrieve_timeout: Duration,

    /// Deadline for answer generation. Default: 60s.
    pub generate_timeout: Duration,

    /// Treat failed lookups as misses instead of failing the request.
    /// Default: `false`.
    pub degrade_on_lookup_error: bool,

    /// Max entries in the embedding cache. Default: `100_000`.
    pub embed_cache_capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            semantic_cache_namespace: SEMANTIC_CACHE_NAMESPACE.to_string(),
            document_namespace: DOCUMENT_NAMESPACE.to_string(),
            dimension: 1536,
            metric: DistanceMetric::Cosine,
            hnsw_m: DEFAULT_M,
            hnsw_ef_construction: DEFAULT_EF_CONSTRUCTION,
            hnsw_ef_runtime: DEFAULT_EF_RUNTIME,
            cache_score_threshold: pipeline.cache_score_threshold,
            document_score_threshold: pipeline.document_score_threshold,
            cache_top_k: pipeline.cache_top_k,
            document_top_k: pipeline.document_top_k,
            max_grounding_docs: pipeline.max_grounding_docs,
            max_document_chars: pipeline.max_document_chars,
            embed_timeout: pipeline.embed_timeout,
            lookup_timeout: pipeline.lookup_timeout,
            retrieve_timeout: pipeline.retrieve_timeout,
            generate_timeout: pipeline.generate_timeout,
            degrade_on_lookup_error: pipeline.degrade_on_lookup_error,
            embed_cache_capacity: DEFAULT_EMBED_CACHE_CAPACITY,
        }
    }
}

impl Config {
    const ENV_SEMANTIC_CACHE_NAMESPACE: &'static str = "RECALL_SEMANTIC_CACHE_NAMESPACE";
    const ENV_DOCUMENT_NAMESPACE: &'static str = "RECALL_DOCUMENT_NAMESPACE";
    const ENV_DIMENSION: &'static str = "RECALL_DIMENSION";
    const ENV_METRIC: &'static str = "RECALL_METRIC";
    const ENV_HNSW_M: &'static str = "RECALL_HNSW_M";
    const ENV_HNSW_EF_CONSTRUCTION: &'static str = "RECALL_HNSW_EF_CONSTRUCTION";
    const ENV_HNSW_EF_RUNTIME: &'static str = "RECALL_HNSW_EF_RUNTIME";
    const ENV_CACHE_SCORE_THRESHOLD: &'static str = "RECALL_CACHE_SCORE_THRESHOLD";
    const ENV_DOCUMENT_SCORE_THRESHOLD: &'static str = "RECALL_DOCUMENT_SCORE_THRESHOLD";
    const ENV_CACHE_TOP_K: &'static str = "RECALL_CACHE_TOP_K";
    const ENV_DOCUMENT_TOP_K: &'static str = "RECALL_DOCUMENT_TOP_K";
    const ENV_MAX_GROUNDING_DOCS: &'static str = "RECALL_MAX_GROUNDING_DOCS";
    const ENV_MAX_DOCUMENT_CHARS: &'static str = "RECALL_MAX_DOCUMENT_CHARS";
    const ENV_EMBED_TIMEOUT_MS: &'static str = "RECALL_EMBED_TIMEOUT_MS";
    const ENV_LOOKUP_TIMEOUT_MS: &'static str = "RECALL_LOOKUP_TIMEOUT_MS";
    const ENV_RETRIEVE_TIMEOUT_MS: &'static str = "RECALL_RETRIEVE_TIMEOUT_MS";
    const ENV_GENERATE_TIMEOUT_MS: &'static str = "RECALL_GENERATE_TIMEOUT_MS";
    const ENV_DEGRADE_ON_LOOKUP_ERROR: &'static str = "RECALL_DEGRADE_ON_LOOKUP_ERROR";
    const ENV_EMBED_CACHE_CAPACITY: &'static str = "RECALL_EMBED_CACHE_CAPACITY";

    /// Loads configuration from environment variables (falling back to
    /// defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            semantic_cache_namespace: string_from_env(
                Self::ENV_SEMANTIC_CACHE_NAMESPACE,
                defaults.semantic_cache_namespace,
            ),
            document_namespace: string_from_env(
                Self::ENV_DOCUMENT_NAMESPACE,
                defaults.document_namespace,
            ),
            dimension: number_from_env(Self::ENV_DIMENSION, defaults.dimension)?,
            metric: metric_from_env(Self::ENV_METRIC, defaults.metric)?,
            hnsw_m: number_from_env(Self::ENV_HNSW_M, defaults.hnsw_m)?,
            hnsw_ef_construction: number_from_env(
                Self::ENV_HNSW_EF_CONSTRUCTION,
                defaults.hnsw_ef_construction,
            )?,
            hnsw_ef_runtime: number_from_env(Self::ENV_HNSW_EF_RUNTIME, defaults.hnsw_ef_runtime)?,
            cache_score_threshold: float_from_env(
                Self::ENV_CACHE_SCORE_THRESHOLD,
                defaults.cache_score_threshold,
            )?,
            document_score_threshold: float_from_env(
                Self::ENV_DOCUMENT_SCORE_THRESHOLD,
                defaults.document_score_threshold,
            )?,
            cache_top_k: number_from_env(Self::ENV_CACHE_TOP_K, defaults.cache_top_k)?,
            document_top_k: number_from_env(Self::ENV_DOCUMENT_TOP_K, defaults.document_top_k)?,
            max_grounding_docs: number_from_env(
                Self::ENV_MAX_GROUNDING_DOCS,
                defaults.max_grounding_docs,
            )?,
            max_document_chars: number_from_env(
                Self::ENV_MAX_DOCUMENT_CHARS,
                defaults.max_document_chars,
            )?,
            embed_timeout: duration_from_env(Self::ENV_EMBED_TIMEOUT_MS, defaults.embed_timeout)?,
            lookup_timeout: duration_from_env(
                Self::ENV_LOOKUP_TIMEOUT_MS,
                defaults.lookup_timeout,
            )?,
            retrieve_timeout: duration_from_env(
                Self::ENV_RETRIEVE_TIMEOUT_MS,
                defaults.retrieve_timeout,
            )?,
            generate_timeout: duration_from_env(
                Self::ENV_GENERATE_TIMEOUT_MS,
                defaults.generate_timeout,
            )?,
            degrade_on_lookup_error: bool_from_env(
                Self::ENV_DEGRADE_ON_LOOKUP_ERROR,
                defaults.degrade_on_lookup_error,
            )?,
            embed_cache_capacity: number_from_env(
                Self::ENV_EMBED_CACHE_CAPACITY,
                defaults.embed_cache_capacity,
            )?,
        })
    }

    /// Validates basic invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dimension",
                reason: "must be > 0".to_string(),
            });
        }
        if self.hnsw_m < 2 {
            return Err(ConfigError::InvalidValue {
                field: "hnsw_m",
                reason: "must be >= 2".to_string(),
            });
        }
        if self.cache_top_k == 0 || self.document_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "top_k",
                reason: "must be > 0".to_string(),
            });
        }
        for (field, value) in [
            ("cache_score_threshold", self.cache_score_threshold),
            ("document_score_threshold", self.document_score_threshold),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("{value} is outside [-1, 1]"),
                });
            }
        }
        if self.semantic_cache_namespace == self.document_namespace {
            return Err(ConfigError::InvalidValue {
                field: "document_namespace",
                reason: "must differ from the semantic cache namespace".to_string(),
            });
        }
        Ok(())
    }

    /// HNSW parameters shared by both namespaces.
    pub fn hnsw_params(&self) -> HnswParams {
        HnswParams {
            m: self.hnsw_m,
            ef_construction: self.hnsw_ef_construction,
            ef_runtime: self.hnsw_ef_runtime,
        }
    }

    /// Namespace configuration for the QA tier.
    pub fn semantic_cache_config(&self) -> SemanticCacheConfig {
        SemanticCacheConfig {
            namespace: self.semantic_cache_namespace.clone(),
            dimension: self.dimension,
            metric: self.metric,
            hnsw: self.hnsw_params(),
        }
    }

    /// Namespace configuration for the document tier.
    pub fn document_index_config(&self) -> DocumentIndexConfig {
        DocumentIndexConfig {
            namespace: self.document_namespace.clone(),
            dimension: self.dimension,
            metric: self.metric,
            hnsw: self.hnsw_params(),
        }
    }

    /// Orchestrator policy derived from this configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            cache_score_threshold: self.cache_score_threshold,
            document_score_threshold: self.document_score_threshold,
            cache_top_k: self.cache_top_k,
            document_top_k: self.document_top_k,
            max_grounding_docs: self.max_grounding_docs,
            max_document_chars: self.max_document_chars,
            embed_timeout: self.embed_timeout,
            lookup_timeout: self.lookup_timeout,
            retrieve_timeout: self.retrieve_timeout,
            generate_timeout: self.generate_timeout,
            degrade_on_lookup_error: self.degrade_on_lookup_error,
            index_retrieved_documents: true,
        }
    }
}

fn string_from_env(var: &'static str, default: String) -> String {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn number_from_env<T: std::str::FromStr>(
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(default),
    }
}

fn float_from_env(var: &'static str, default: f32) -> Result<f32, ConfigError> {
    number_from_env(var, default)
}

fn duration_from_env(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let millis = number_from_env(var, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

fn bool_from_env(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value }),
        },
        Err(_) => Ok(default),
    }
}

fn metric_from_env(var: &'static str, default: DistanceMetric) -> Result<DistanceMetric, ConfigError> {
    match env::var(var) {
        Ok(value) => {
            DistanceMetric::parse(&value).ok_or(ConfigError::InvalidMetric { value })
        }
        Err(_) => Ok(default),
    }
}

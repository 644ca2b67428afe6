use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::schema::{FieldKind, Schema};

/// Distance metric for a namespace.
///
/// Callers never see raw distances: every metric defines a conversion to a
/// similarity where higher means closer, so results from different metrics
/// are comparable in the same terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine distance `1 - cos(a, b)`; similarity = `1 - distance`.
    Cosine,
    /// Euclidean (L2) distance; similarity = `1 / (1 + distance)`.
    Euclidean,
}

impl DistanceMetric {
    /// Raw distance between two equal-length vectors.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        }
    }

    /// Converts a raw distance into the normalized similarity callers
    /// reason in (higher = more similar).
    pub fn similarity_from_distance(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::Euclidean => 1.0 / (1.0 + distance),
        }
    }

    /// Stable name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    /// Parses a configuration name (`cosine`, `euclidean`/`l2`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "cosine" => Some(DistanceMetric::Cosine),
            "euclidean" | "l2" => Some(DistanceMetric::Euclidean),
            _ => None,
        }
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// A typed attribute value.
///
/// Replaces the stringly metadata maps of ad hoc vector stores: each
/// namespace declares which fields exist and of which kind, and `add`
/// rejects mismatches instead of silently stringifying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
}

impl AttributeValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            AttributeValue::Text(_) => FieldKind::Text,
            AttributeValue::Number(_) => FieldKind::Number,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(_) => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

/// Attribute map attached to an indexed record.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A stored record: caller-supplied id, embedding vector, typed attributes,
/// creation timestamp. Identity is `(namespace, id)`; re-adding an existing
/// id overwrites the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub attributes: Attributes,
    /// Epoch milliseconds; breaks similarity ties (most recent first).
    pub created_at: i64,
}

impl IndexedRecord {
    /// Creates a record stamped with the current time.
    pub fn new(id: impl Into<String>, vector: Vec<f32>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            vector,
            attributes,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Overrides the creation timestamp (tests, backfills).
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }
}

/// One search result. `similarity` is normalized per the namespace metric;
/// within one search call, higher always means more similar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub similarity: f32,
    pub record: IndexedRecord,
}

/// Identity of a namespace: name, vector dimension, metric, and attribute
/// schema. All records in a namespace share the dimension; `ensure` with a
/// spec that disagrees with the existing namespace is a fatal error.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub schema: Schema,
}

impl NamespaceSpec {
    pub fn new(
        name: impl Into<String>,
        dimension: usize,
        metric: DistanceMetric,
        schema: Schema,
    ) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric,
            schema,
        }
    }
}

/// Point-in-time counters for a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub records: usize,
    pub tombstones: usize,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub max_level: usize,
}

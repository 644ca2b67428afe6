//! Deterministic mock embedding provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::error::EmbeddingError;
use super::EmbeddingProvider;

/// Test provider deriving reproducible unit vectors from the text hash.
///
/// Same text always embeds to the same vector; unrelated texts land nearly
/// orthogonal at realistic dimensions. Individual texts can be scripted to
/// fixed vectors, and the whole provider can be switched into a failing
/// state to exercise error paths.
#[derive(Clone)]
pub struct MockEmbedder {
    dimension: usize,
    scripted: Arc<RwLock<HashMap<String, Vec<f32>>>>,
    failure: Arc<RwLock<Option<String>>>,
    calls: Arc<AtomicU64>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            scripted: Arc::new(RwLock::new(HashMap::new())),
            failure: Arc::new(RwLock::new(None)),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Pins the embedding returned for one text.
    pub fn script(&self, text: &str, vector: Vec<f32>) {
        self.scripted.write().insert(text.to_string(), vector);
    }

    /// Makes every subsequent call fail with a provider error.
    pub fn fail_with(&self, message: &str) {
        *self.failure.write() = Some(message.to_string());
    }

    /// Clears a previously injected failure.
    pub fn clear_failure(&self) {
        *self.failure.write() = None;
    }

    /// Number of `embed` calls received (including failed ones).
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn derive(&self, text: &str) -> Vec<f32> {
        let mut reader = blake3::Hasher::new().update(text.as_bytes()).finalize_xof();
        let mut bytes = vec![0u8; self.dimension * 4];
        reader.fill(&mut bytes);

        let mut vector: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|chunk| {
                let bits = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                // Uniform in [-1, 1).
                (bits as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl std::fmt::Debug for MockEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEmbedder")
            .field("dimension", &self.dimension)
            .field("calls", &self.calls.load(Ordering::Relaxed))
            .finish()
    }
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if let Some(message) = self.failure.read().clone() {
            return Err(EmbeddingError::Provider { message });
        }

        if let Some(vector) = self.scripted.read().get(text).cloned() {
            return Ok(vector);
        }

        Ok(self.derive(text))
    }
}

//! Answer generation seam.

use thiserror::Error;

use crate::pipeline::GroundingDocument;

#[derive(Debug, Error)]
/// Errors from the answer generator.
pub enum GenerationError {
    /// The generation call failed.
    #[error("answer generation failed: {message}")]
    Failed {
        /// Error message.
        message: String,
    },
}

/// Produces an answer for a query, optionally supported by grounding
/// documents. An empty `grounding` slice means the generator answers from
/// the query alone.
pub trait AnswerGenerator: Send + Sync {
    fn generate(
        &self,
        query: &str,
        grounding: &[GroundingDocument],
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockGenerator;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use parking_lot::RwLock;

    use super::{AnswerGenerator, GenerationError};
    use crate::pipeline::GroundingDocument;

    /// Scripted generator for tests.
    #[derive(Clone)]
    pub struct MockGenerator {
        answer: Arc<RwLock<String>>,
        failure: Arc<RwLock<Option<String>>>,
        calls: Arc<AtomicU64>,
        last_grounding_len: Arc<AtomicU64>,
    }

    impl MockGenerator {
        pub fn answering(answer: &str) -> Self {
            Self {
                answer: Arc::new(RwLock::new(answer.to_string())),
                failure: Arc::new(RwLock::new(None)),
                calls: Arc::new(AtomicU64::new(0)),
                last_grounding_len: Arc::new(AtomicU64::new(0)),
            }
        }

        pub fn respond_with(&self, answer: &str) {
            *self.answer.write() = answer.to_string();
        }

        pub fn fail_with(&self, message: &str) {
            *self.failure.write() = Some(message.to_string());
        }

        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }

        /// Grounding-document count of the most recent call.
        pub fn last_grounding_len(&self) -> usize {
            self.last_grounding_len.load(Ordering::Relaxed) as usize
        }
    }

    impl AnswerGenerator for MockGenerator {
        async fn generate(
            &self,
            _query: &str,
            grounding: &[GroundingDocument],
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.last_grounding_len
                .store(grounding.len() as u64, Ordering::Relaxed);

            if let Some(message) = self.failure.read().clone() {
                return Err(GenerationError::Failed { message });
            }

            Ok(self.answer.read().clone())
        }
    }
}

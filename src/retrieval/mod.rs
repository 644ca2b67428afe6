//! External document retrieval seam.
//!
//! The retriever stands in for the search/scrape pipeline: best-effort,
//! may return nothing, no latency guarantee. The caller imposes its own
//! deadline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A document fetched from an external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub source_url: String,
    pub content: String,
}

#[derive(Debug, Error)]
/// Errors from the external retriever.
pub enum RetrievalError {
    /// The retrieval call failed.
    #[error("document retrieval failed: {message}")]
    Failed {
        /// Error message.
        message: String,
    },
}

/// Fetches grounding documents for a query.
pub trait DocumentRetriever: Send + Sync {
    fn retrieve(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<RetrievedDocument>, RetrievalError>> + Send;
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockRetriever;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use parking_lot::RwLock;

    use super::{DocumentRetriever, RetrievalError, RetrievedDocument};

    /// Scripted retriever for tests.
    #[derive(Clone, Default)]
    pub struct MockRetriever {
        results: Arc<RwLock<Vec<RetrievedDocument>>>,
        failure: Arc<RwLock<Option<String>>>,
        calls: Arc<AtomicU64>,
    }

    impl MockRetriever {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets the documents every subsequent call returns.
        pub fn respond_with(&self, docs: Vec<RetrievedDocument>) {
            *self.results.write() = docs;
        }

        /// Makes every subsequent call fail.
        pub fn fail_with(&self, message: &str) {
            *self.failure.write() = Some(message.to_string());
        }

        pub fn calls(&self) -> u64 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    impl DocumentRetriever for MockRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<RetrievedDocument>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::Relaxed);

            if let Some(message) = self.failure.read().clone() {
                return Err(RetrievalError::Failed { message });
            }

            Ok(self.results.read().clone())
        }
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};

use super::DocumentLoader;
use super::github::validate_request;
use crate::document::{Document, LoadError};
use crate::vector_store::BoxFuture;

/// Loader serving a fixed document set, applying the same request validation
/// as [`super::GithubLoader`].
#[derive(Debug, Default)]
pub struct StaticLoader {
    documents: Vec<Document>,
    loads: AtomicUsize,
}

impl StaticLoader {
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of completed `load` calls.
    #[must_use]
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl DocumentLoader for StaticLoader {
    fn validate(&self, source: &str, credential: &str) -> Result<(), LoadError> {
        validate_request(source, credential).map(|_| ())
    }

    fn load(
        &self,
        source: &str,
        credential: &str,
    ) -> BoxFuture<'_, Result<Vec<Document>, LoadError>> {
        let checked = validate_request(source, credential).map(|_| ());
        Box::pin(async move {
            checked?;
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.documents.clone())
        })
    }
}

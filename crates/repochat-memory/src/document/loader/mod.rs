#[cfg(any(test, feature = "mock"))]
mod fixture;
mod github;
mod ignore;

#[cfg(any(test, feature = "mock"))]
pub use fixture::StaticLoader;
pub use github::{GithubLoader, RepoRef, validate_request};
pub use ignore::IgnoreRules;

use super::{Document, LoadError};
use crate::vector_store::BoxFuture;

/// Source of repository documents.
pub trait DocumentLoader: Send + Sync {
    /// Check the request locally, before any network call is made.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Validation` when the source or credential is malformed.
    fn validate(&self, source: &str, credential: &str) -> Result<(), LoadError>;

    /// Fetch every eligible file of `source` as a document.
    fn load(&self, source: &str, credential: &str)
    -> BoxFuture<'_, Result<Vec<Document>, LoadError>>;
}

/// Failures of the repository loader.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid repository request: {0}")]
    Validation(String),

    #[error("GitHub rejected the access token (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    #[error("GitHub request failed (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid ignore pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },
}

/// Failures of an ingestion run, tagged by the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("loading failed: {0}")]
    Load(#[from] LoadError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] repochat_llm::LlmError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::vector_store::VectorStoreError),
}

impl DocumentError {
    /// Whether the failure was caused by the caller's input rather than a collaborator.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Load(LoadError::Validation(_)))
    }
}

use repochat_llm::LlmError;
use repochat_memory::VectorStoreError;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("failed to embed query: {0}")]
    Embedding(#[source] LlmError),

    #[error("failed to query vector store: {0}")]
    Store(#[from] VectorStoreError),

    #[error("completion failed: {0}")]
    Completion(#[source] LlmError),
}

impl AssistantError {
    /// Whether the caller sent an unusable request, as opposed to an upstream failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyMessage)
    }
}

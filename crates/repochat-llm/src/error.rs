#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("{provider} rejected credentials: {message}")]
    Unauthorized {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} request failed (status {status}): {message}")]
    Upstream {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} unavailable after {attempts} attempts: {message}")]
    RetriesExhausted {
        provider: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding count mismatch: sent {expected} inputs, got {actual} vectors")]
    EmbeddingCount { expected: usize, actual: usize },

    #[error("SSE parse error: {0}")]
    SseParse(String),

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether the failure is worth another attempt: throttling, server-side
    /// errors, timeouts and dropped connections.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};

/// Scripted provider: queued chat responses, deterministic embeddings and a
/// record of every prompt it received.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<Vec<Message>>>>,
    embedded: Arc<Mutex<usize>>,
    pub default_response: String,
    /// Dimension of the vectors returned by `embed`.
    pub dimension: usize,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Milliseconds to sleep before every chat or embedding response.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            embedded: Arc::new(Mutex::new(0)),
            default_response: "mock response".into(),
            dimension: 16,
            supports_embeddings: true,
            fail_chat: false,
            fail_embed: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_embeddings() -> Self {
        Self {
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Every message list passed to `chat` or `chat_stream`, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of texts embedded so far.
    #[must_use]
    pub fn embedded_count(&self) -> usize {
        *self.embedded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.max(1);
        let mut v = vec![0.0f32; dim];
        for (i, b) in text.bytes().enumerate() {
            v[(usize::from(b) + i) % dim] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        } else {
            v[0] = 1.0;
        }
        v
    }
}

impl LlmProvider for MockProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let response = self.chat(messages).await?;
        let chunks: Vec<_> = response
            .split_inclusive(' ')
            .map(|word| Ok(word.to_owned()))
            .collect();
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported { provider: "mock" });
        }
        if self.fail_embed {
            return Err(LlmError::RetriesExhausted {
                provider: "mock",
                attempts: 3,
                message: "status 503 Service Unavailable".into(),
            });
        }
        *self.embedded.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }
}

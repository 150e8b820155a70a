//! Retrieval-augmented answers over an ingested repository.

mod error;
mod summary;

pub use error::AssistantError;
pub use summary::{ModelSummary, RepoStats, RepositoryMetadata, SummaryFields};

use std::fmt::Write as _;
use std::sync::Arc;

use repochat_llm::{ChatStream, LlmProvider, Message};
use repochat_memory::VectorStore;
use serde::Serialize;

use crate::config::{MAX_CHAT_TOP_K, RetrievalConfig};
use summary::{ContextStats, SUMMARY_SYSTEM_PROMPT};

/// Query embedded to find chunks that describe the project as a whole.
pub const SUMMARY_PROBE: &str = "Project overview and architecture";

const CHAT_INSTRUCTIONS: &str = "You are an expert on the codebase described by the excerpts below. \
Answer the user's questions using these excerpts. When they do not contain the answer, say so \
instead of guessing. Keep answers concise and use light Markdown: short paragraphs, bullet lists, \
and fenced code blocks for code.";

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// Non-streaming chat answer together with the context it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub context: String,
}

pub struct RepoAssistant<P> {
    embedder: Arc<P>,
    completer: Arc<P>,
    store: Arc<dyn VectorStore>,
    retrieval: RetrievalConfig,
}

impl<P: LlmProvider> RepoAssistant<P> {
    #[must_use]
    pub fn new(
        embedder: Arc<P>,
        completer: Arc<P>,
        store: Arc<dyn VectorStore>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            completer,
            store,
            retrieval,
        }
    }

    fn chat_top_k(&self) -> u64 {
        self.retrieval.chat_top_k.clamp(1, MAX_CHAT_TOP_K)
    }

    /// Embed `query` and return up to `top_k` chunks of `namespace`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding request or the vector store query fails.
    pub async fn retrieve(
        &self,
        namespace: &str,
        query: &str,
        top_k: u64,
    ) -> Result<Vec<RetrievedChunk>, AssistantError> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(AssistantError::Embedding)?;
        let matches = self.store.query(namespace, vector, top_k, true).await?;
        let chunks: Vec<RetrievedChunk> = matches
            .into_iter()
            .filter_map(|m| {
                m.metadata.map(|meta| RetrievedChunk {
                    source: meta.source,
                    text: meta.text,
                    score: m.score,
                })
            })
            .collect();
        tracing::debug!(namespace, top_k, matches = chunks.len(), "retrieved context");
        Ok(chunks)
    }

    /// Describe the repository stored under `namespace`.
    ///
    /// An empty namespace yields a fixed "ingest first" answer without calling the model.
    /// Malformed model output is repaired field by field from locally computed figures.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding, retrieval or the completion request fails.
    pub async fn summarize(&self, namespace: &str) -> Result<RepositoryMetadata, AssistantError> {
        let chunks = self
            .retrieve(namespace, SUMMARY_PROBE, self.retrieval.summary_top_k)
            .await?;
        if chunks.is_empty() {
            tracing::info!(namespace, "no context for summary");
            return Ok(RepositoryMetadata::empty());
        }

        let stats = ContextStats::from_chunks(&chunks);
        let repo_stats = stats.to_repo_stats();
        let mut prompt = format!(
            "Repository `{namespace}`: {} files, about {} lines, languages: {}.\n\nCode excerpts:\n\n",
            repo_stats.files,
            repo_stats.lines,
            stats
                .languages
                .iter()
                .copied()
                .collect::<Vec<_>>()
                .join(", ")
        );
        prompt.push_str(&format_context(&chunks));

        let messages = [Message::system(SUMMARY_SYSTEM_PROMPT), Message::user(prompt)];
        let raw = self
            .completer
            .chat(&messages)
            .await
            .map_err(AssistantError::Completion)?;

        let metadata = ModelSummary::parse(&raw).into_metadata(&stats);
        tracing::info!(
            namespace,
            files = metadata.stats.files,
            languages = metadata.stats.languages,
            "repository summarized"
        );
        Ok(metadata)
    }

    /// Answer `message` in one piece, returning the context used.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty message, or if embedding, retrieval or completion fails.
    pub async fn chat(
        &self,
        namespace: &str,
        message: &str,
        history: &[Message],
    ) -> Result<ChatReply, AssistantError> {
        let (messages, context) = self.prepare_chat(namespace, message, history).await?;
        let response = self
            .completer
            .chat(&messages)
            .await
            .map_err(AssistantError::Completion)?;
        Ok(ChatReply { response, context })
    }

    /// Answer `message` as a stream of text deltas.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be started. Failures after the first
    /// delta arrive as stream items.
    pub async fn chat_stream(
        &self,
        namespace: &str,
        message: &str,
        history: &[Message],
    ) -> Result<ChatStream, AssistantError> {
        let (messages, _context) = self.prepare_chat(namespace, message, history).await?;
        self.completer
            .chat_stream(&messages)
            .await
            .map_err(AssistantError::Completion)
    }

    async fn prepare_chat(
        &self,
        namespace: &str,
        message: &str,
        history: &[Message],
    ) -> Result<(Vec<Message>, String), AssistantError> {
        if message.trim().is_empty() {
            return Err(AssistantError::EmptyMessage);
        }
        let chunks = self.retrieve(namespace, message, self.chat_top_k()).await?;
        let context = format_context(&chunks);

        let mut system = format!("{CHAT_INSTRUCTIONS}\n\nRepository: {namespace}\n\n");
        if context.is_empty() {
            system.push_str("No code excerpts matched this question.");
        } else {
            system.push_str("Code excerpts:\n\n");
            system.push_str(&context);
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend_from_slice(history);
        messages.push(Message::user(message));
        Ok((messages, context))
    }
}

/// Join chunks as `--- path ---` headed sections.
fn format_context(chunks: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let _ = write!(out, "--- {} ---\n{}", chunk.source, chunk.text);
    }
    out
}

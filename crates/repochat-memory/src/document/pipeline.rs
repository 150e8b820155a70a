use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use repochat_llm::{LlmError, LlmProvider};
use uuid::Uuid;

use super::{Chunk, DocumentError, DocumentLoader, TextSplitter};
use crate::namespace::namespace_from_url;
use crate::vector_store::{
    RecordMetadata, UpsertBatching, VectorRecord, VectorStore, upsert_in_batches,
};

/// Batching knobs of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestConfig {
    pub upsert: UpsertBatching,
}

/// Result of a successful ingestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The repository was loaded, chunked, embedded and stored.
    Ingested {
        namespace: String,
        documents: usize,
        chunks: usize,
    },
    /// The namespace already held records; nothing was loaded or written.
    AlreadyIngested { namespace: String, records: u64 },
}

impl IngestOutcome {
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::Ingested { namespace, .. } | Self::AlreadyIngested { namespace, .. } => {
                namespace
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngestStage {
    Received,
    Validating,
    Skipped,
    Loading,
    Splitting,
    Embedding,
    Upserting,
    Done,
    Failed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Skipped => "skipped",
            Self::Loading => "loading",
            Self::Splitting => "splitting",
            Self::Embedding => "embedding",
            Self::Upserting => "upserting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Loader → splitter → embedder → vector store, one repository per call.
pub struct IngestionPipeline<P> {
    loader: Arc<dyn DocumentLoader>,
    splitter: TextSplitter,
    provider: Arc<P>,
    store: Arc<dyn VectorStore>,
    config: IngestConfig,
}

impl<P> fmt::Debug for IngestionPipeline<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("splitter", &self.splitter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn record_id(namespace: &str, run_millis: u128, index: usize) -> String {
    let name = format!("{namespace}:{run_millis}:{index}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

impl<P: LlmProvider> IngestionPipeline<P> {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        splitter: TextSplitter,
        provider: Arc<P>,
        store: Arc<dyn VectorStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            loader,
            splitter,
            provider,
            store,
            config,
        }
    }

    /// Check a request without touching GitHub, the embedder or the store.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Load` wrapping `LoadError::Validation` for malformed input.
    pub fn validate(&self, repo_url: &str, token: &str) -> Result<(), DocumentError> {
        self.loader.validate(repo_url, token)?;
        Ok(())
    }

    /// Ingest the repository at `repo_url` into its namespace.
    ///
    /// A namespace that already holds records is left untouched and reported as
    /// [`IngestOutcome::AlreadyIngested`]. Batches written before a failure stay
    /// written.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Load` for invalid input or GitHub failures,
    /// `DocumentError::Embedding` when embedding fails after retries, and
    /// `DocumentError::Storage` for vector store failures.
    pub async fn ingest(
        &self,
        repo_url: &str,
        token: &str,
    ) -> Result<IngestOutcome, DocumentError> {
        let namespace = namespace_from_url(repo_url);
        tracing::info!(namespace = %namespace, stage = %IngestStage::Received, "ingestion request");

        match self.run(repo_url, token, &namespace).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(
                    namespace = %namespace,
                    stage = %IngestStage::Failed,
                    "ingestion failed: {e}"
                );
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        repo_url: &str,
        token: &str,
        namespace: &str,
    ) -> Result<IngestOutcome, DocumentError> {
        tracing::debug!(namespace, stage = %IngestStage::Validating);
        self.loader.validate(repo_url, token)?;

        let existing = self.store.describe_stats(Some(namespace)).await?.count(namespace);
        if existing > 0 {
            tracing::info!(
                namespace,
                records = existing,
                stage = %IngestStage::Skipped,
                "repository already ingested"
            );
            return Ok(IngestOutcome::AlreadyIngested {
                namespace: namespace.to_owned(),
                records: existing,
            });
        }

        tracing::info!(namespace, stage = %IngestStage::Loading);
        let documents = self.loader.load(repo_url, token).await?;

        tracing::info!(namespace, documents = documents.len(), stage = %IngestStage::Splitting);
        let chunks = self.splitter.split_all(&documents);

        tracing::info!(namespace, chunks = chunks.len(), stage = %IngestStage::Embedding);
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.provider.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(DocumentError::Embedding(LlmError::EmbeddingCount {
                expected: texts.len(),
                actual: vectors.len(),
            }));
        }

        tracing::info!(namespace, chunks = chunks.len(), stage = %IngestStage::Upserting);
        let records = build_records(namespace, chunks, vectors);
        let written =
            upsert_in_batches(self.store.as_ref(), namespace, records, self.config.upsert).await?;

        tracing::info!(
            namespace,
            documents = documents.len(),
            chunks = written,
            stage = %IngestStage::Done,
            "ingestion complete"
        );
        Ok(IngestOutcome::Ingested {
            namespace: namespace.to_owned(),
            documents: documents.len(),
            chunks: written,
        })
    }
}

fn build_records(
    namespace: &str,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
) -> Vec<VectorRecord> {
    let run_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    chunks
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (chunk, vector))| VectorRecord {
            id: record_id(namespace, run_millis, i),
            vector,
            metadata: RecordMetadata {
                source: chunk.metadata.source,
                text: chunk.content,
            },
        })
        .collect()
}

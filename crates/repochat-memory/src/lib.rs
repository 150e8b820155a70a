//! Repository ingestion: GitHub loading, chunking and namespaced vector storage.

pub mod document;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod in_memory_store;
pub mod namespace;
pub mod qdrant_ops;
pub mod vector_store;

#[cfg(any(test, feature = "mock"))]
pub use document::StaticLoader;
pub use document::{
    Chunk, Document, DocumentError, DocumentLoader, DocumentMetadata, GithubLoader, IgnoreRules,
    IngestConfig, IngestOutcome, IngestionPipeline, LoadError, RepoRef, SplitterConfig,
    TextSplitter,
};
pub use error::MemoryError;
#[cfg(any(test, feature = "mock"))]
pub use in_memory_store::InMemoryVectorStore;
pub use namespace::{DEFAULT_NAMESPACE, namespace_from_url};
pub use qdrant_ops::QdrantOps;
pub use vector_store::{
    BoxFuture, IndexStats, QueryMatch, RecordMetadata, UpsertBatching, VectorRecord, VectorStore,
    VectorStoreError, upsert_in_batches,
};

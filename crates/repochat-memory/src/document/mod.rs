pub mod error;
pub mod loader;
pub mod pipeline;
pub mod splitter;
pub mod types;

pub use error::{DocumentError, LoadError};
#[cfg(any(test, feature = "mock"))]
pub use loader::StaticLoader;
pub use loader::{DocumentLoader, GithubLoader, IgnoreRules, RepoRef};
pub use pipeline::{IngestConfig, IngestOutcome, IngestionPipeline};
pub use splitter::{SplitterConfig, TextSplitter};
pub use types::{Chunk, Document, DocumentMetadata};

/// Default maximum blob size: 1 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

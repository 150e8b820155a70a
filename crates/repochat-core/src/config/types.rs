use serde::{Deserialize, Serialize};

use crate::vault::Secret;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default = "EndpointConfig::embedding")]
    pub embedding: EndpointConfig,
    #[serde(default = "EndpointConfig::completion")]
    pub completion: EndpointConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests per minute per client IP. Zero disables limiting.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    #[serde(default = "default_ingest_timeout")]
    pub ingest_timeout_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3000
}

fn default_rate_limit() -> u32 {
    60
}

fn default_max_body_size() -> usize {
    1_048_576
}

fn default_ingest_timeout() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            rate_limit: default_rate_limit(),
            max_body_size: default_max_body_size(),
            ingest_timeout_secs: default_ingest_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubConfig {
    #[serde(default = "default_github_api_base")]
    pub api_base: String,
    /// Blob downloads in flight per ingestion.
    #[serde(default = "default_github_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Glob patterns skipped in addition to the built-in deny-list.
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_github_api_base() -> String {
    "https://api.github.com".into()
}

fn default_github_concurrency() -> usize {
    8
}

fn default_max_file_size() -> u64 {
    1_048_576
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api_base(),
            concurrency: default_github_concurrency(),
            max_file_size: default_max_file_size(),
            ignore: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// An OpenAI-compatible endpoint used either for embeddings or for completions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    pub model: String,
    /// Inputs per embedding request.
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    /// Total attempts for a transient failure, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_embed_batch_size() -> usize {
    50
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

impl EndpointConfig {
    fn with_model(model: &str) -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: model.into(),
            batch_size: default_embed_batch_size(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
        }
    }

    pub(crate) fn embedding() -> Self {
        Self::with_model("text-embedding-3-small")
    }

    pub(crate) fn completion() -> Self {
        Self::with_model("gpt-4o-mini")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    /// Collection holding every namespace. Usually supplied via `REPOCHAT_VECTOR_STORE_INDEX`.
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
    #[serde(default = "default_upsert_delay_ms")]
    pub upsert_delay_ms: u64,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_upsert_batch_size() -> usize {
    100
}

fn default_upsert_delay_ms() -> u64 {
    50
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            index_name: None,
            upsert_batch_size: default_upsert_batch_size(),
            upsert_delay_ms: default_upsert_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_chat_top_k")]
    pub chat_top_k: u64,
    #[serde(default = "default_summary_top_k")]
    pub summary_top_k: u64,
}

fn default_chat_top_k() -> u64 {
    5
}

fn default_summary_top_k() -> u64 {
    100
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chat_top_k: default_chat_top_k(),
            summary_top_k: default_summary_top_k(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            github: GithubConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EndpointConfig::embedding(),
            completion: EndpointConfig::completion(),
            vector_store: VectorStoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            secrets: ResolvedSecrets::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub embedding_api_key: Option<Secret>,
    pub completion_api_key: Option<Secret>,
    pub vector_store_api_key: Option<Secret>,
}

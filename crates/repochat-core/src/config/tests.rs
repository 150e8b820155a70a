use std::io::Write;

use serial_test::serial;

use super::*;
use crate::vault::MockVaultProvider;

const ENV_KEYS: [&str; 14] = [
    "REPOCHAT_BIND",
    "REPOCHAT_PORT",
    "REPOCHAT_RATE_LIMIT",
    "REPOCHAT_MAX_BODY_SIZE",
    "REPOCHAT_INGEST_TIMEOUT",
    "REPOCHAT_GITHUB_API_BASE",
    "REPOCHAT_GITHUB_CONCURRENCY",
    "REPOCHAT_EMBEDDING_BASE_URL",
    "REPOCHAT_EMBEDDING_MODEL",
    "REPOCHAT_COMPLETION_BASE_URL",
    "REPOCHAT_COMPLETION_MODEL",
    "REPOCHAT_VECTOR_STORE_URL",
    "REPOCHAT_CHAT_TOP_K",
    "REPOCHAT_CONFIG",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

async fn resolved_config() -> Config {
    let vault = MockVaultProvider::new()
        .with_secret("REPOCHAT_EMBEDDING_API_KEY", "emb-key")
        .with_secret("REPOCHAT_COMPLETION_API_KEY", "cmp-key")
        .with_secret("REPOCHAT_VECTOR_STORE_API_KEY", "vs-key")
        .with_secret("REPOCHAT_VECTOR_STORE_INDEX", "repos");
    let mut config = Config::default();
    config.resolve_secrets(&vault).await.unwrap();
    config
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.ingest_timeout_secs, 600);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.embedding.model, "text-embedding-3-small");
    assert_eq!(config.embedding.batch_size, 50);
    assert_eq!(config.embedding.max_attempts, 3);
    assert_eq!(config.completion.model, "gpt-4o-mini");
    assert_eq!(config.vector_store.url, "http://localhost:6334");
    assert_eq!(config.vector_store.upsert_batch_size, 100);
    assert_eq!(config.vector_store.upsert_delay_ms, 50);
    assert_eq!(config.retrieval.chat_top_k, 5);
    assert_eq!(config.retrieval.summary_top_k, 100);
    assert!(config.vector_store.index_name.is_none());
    assert!(config.github.ignore.is_empty());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.github.api_base, "https://api.github.com");
}

#[test]
#[serial]
fn parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"
[server]
port = 8080
rate_limit = 0

[github]
concurrency = 4
ignore = ["docs/**"]

[chunking]
chunk_size = 500
chunk_overlap = 50

[embedding]
base_url = "http://embeddings:9000/v1"
model = "nomic-embed-text"
batch_size = 16

[completion]
model = "gpt-4o"
max_tokens = 1024

[vector_store]
url = "http://qdrant:6334"
index_name = "repos"
"#
    )
    .unwrap();

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.rate_limit, 0);
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.github.concurrency, 4);
    assert_eq!(config.github.ignore, vec!["docs/**"]);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.embedding.base_url, "http://embeddings:9000/v1");
    assert_eq!(config.embedding.batch_size, 16);
    assert_eq!(config.completion.model, "gpt-4o");
    assert_eq!(config.completion.base_url, "https://api.openai.com/v1");
    assert_eq!(config.completion.max_tokens, 1024);
    assert_eq!(config.vector_store.index_name.as_deref(), Some("repos"));
    assert_eq!(config.retrieval.chat_top_k, 5);
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[server\nport = 1").unwrap();
    clear_env();
    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("REPOCHAT_COMPLETION_MODEL", "gpt-4.1");
        std::env::set_var("REPOCHAT_PORT", "9999");
        std::env::set_var("REPOCHAT_VECTOR_STORE_URL", "http://vs:6334");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.completion.model, "gpt-4.1");
    assert_eq!(config.server.port, 9999);
    assert_eq!(config.vector_store.url, "http://vs:6334");
}

#[test]
#[serial]
fn env_override_invalid_numbers_ignored() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("REPOCHAT_PORT", "not-a-port");
        std::env::set_var("REPOCHAT_GITHUB_CONCURRENCY", "0");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.server.port, 3000);
    assert_eq!(config.github.concurrency, 8);
}

#[tokio::test]
async fn resolve_secrets_populates_keys_and_index() {
    let config = resolved_config().await;
    assert_eq!(
        config.secrets.embedding_api_key.as_ref().map(Secret::expose),
        Some("emb-key")
    );
    assert_eq!(
        config.secrets.completion_api_key.as_ref().map(Secret::expose),
        Some("cmp-key")
    );
    assert_eq!(config.vector_store.index_name.as_deref(), Some("repos"));
}

#[tokio::test]
async fn resolve_secrets_keeps_toml_index_when_vault_empty() {
    let mut config = Config::default();
    config.vector_store.index_name = Some("from-toml".into());
    config
        .resolve_secrets(&MockVaultProvider::new())
        .await
        .unwrap();
    assert_eq!(config.vector_store.index_name.as_deref(), Some("from-toml"));
    assert!(config.secrets.embedding_api_key.is_none());
}

#[tokio::test]
async fn validate_accepts_complete_config() {
    let config = resolved_config().await;
    config.validate().unwrap();
}

#[test]
fn validate_reports_every_missing_secret() {
    let err = Config::default().validate().unwrap_err().to_string();
    assert!(err.contains("REPOCHAT_EMBEDDING_API_KEY"));
    assert!(err.contains("REPOCHAT_COMPLETION_API_KEY"));
    assert!(err.contains("REPOCHAT_VECTOR_STORE_API_KEY"));
    assert!(err.contains("REPOCHAT_VECTOR_STORE_INDEX"));
}

#[tokio::test]
async fn validate_rejects_blank_secret() {
    let mut config = resolved_config().await;
    config.secrets.completion_api_key = Some(Secret::new("  "));
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("REPOCHAT_COMPLETION_API_KEY"));
    assert!(!err.contains("REPOCHAT_EMBEDDING_API_KEY"));
}

#[tokio::test]
async fn validate_rejects_overlap_not_below_size() {
    let mut config = resolved_config().await;
    config.chunking.chunk_overlap = config.chunking.chunk_size;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("chunk_overlap"));
}

#[tokio::test]
async fn validate_rejects_chat_top_k_out_of_range() {
    let mut config = resolved_config().await;
    config.retrieval.chat_top_k = MAX_CHAT_TOP_K + 1;
    assert!(config.validate().is_err());
    config.retrieval.chat_top_k = 0;
    assert!(config.validate().is_err());
    config.retrieval.chat_top_k = MAX_CHAT_TOP_K;
    config.validate().unwrap();
}

#[tokio::test]
async fn validate_rejects_zero_batch_sizes() {
    let mut config = resolved_config().await;
    config.embedding.batch_size = 0;
    config.vector_store.upsert_batch_size = 0;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("embedding.batch_size"));
    assert!(err.contains("upsert_batch_size"));
}

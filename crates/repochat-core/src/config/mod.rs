mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

/// Upper bound for the number of chunks retrieved per chat turn.
pub const MAX_CHAT_TOP_K: u64 = 10;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve API keys and the index name through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = vault.get_secret("REPOCHAT_EMBEDDING_API_KEY").await? {
            self.secrets.embedding_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("REPOCHAT_COMPLETION_API_KEY").await? {
            self.secrets.completion_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("REPOCHAT_VECTOR_STORE_API_KEY").await? {
            self.secrets.vector_store_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("REPOCHAT_VECTOR_STORE_INDEX").await? {
            self.vector_store.index_name = Some(val);
        }
        Ok(())
    }

    /// Check that required settings are present and numeric settings are usable.
    ///
    /// Meant to run once at startup, after [`Config::resolve_secrets`].
    ///
    /// # Errors
    ///
    /// Returns an error naming every missing or invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut problems = Vec::new();

        let missing = |secret: &Option<Secret>| {
            secret.as_ref().is_none_or(|s| s.expose().trim().is_empty())
        };
        if missing(&self.secrets.embedding_api_key) {
            problems.push("REPOCHAT_EMBEDDING_API_KEY is not set".to_owned());
        }
        if missing(&self.secrets.completion_api_key) {
            problems.push("REPOCHAT_COMPLETION_API_KEY is not set".to_owned());
        }
        if missing(&self.secrets.vector_store_api_key) {
            problems.push("REPOCHAT_VECTOR_STORE_API_KEY is not set".to_owned());
        }
        if self
            .vector_store
            .index_name
            .as_deref()
            .is_none_or(|n| n.trim().is_empty())
        {
            problems.push(
                "vector store index name is not set (REPOCHAT_VECTOR_STORE_INDEX)".to_owned(),
            );
        }

        if self.chunking.chunk_size == 0 {
            problems.push("chunking.chunk_size must be greater than zero".to_owned());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            problems.push(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            ));
        }
        if self.embedding.batch_size == 0 {
            problems.push("embedding.batch_size must be greater than zero".to_owned());
        }
        if self.vector_store.upsert_batch_size == 0 {
            problems.push("vector_store.upsert_batch_size must be greater than zero".to_owned());
        }
        if self.github.concurrency == 0 {
            problems.push("github.concurrency must be greater than zero".to_owned());
        }
        if !(1..=MAX_CHAT_TOP_K).contains(&self.retrieval.chat_top_k) {
            problems.push(format!(
                "retrieval.chat_top_k must be between 1 and {MAX_CHAT_TOP_K}"
            ));
        }
        if self.retrieval.summary_top_k == 0 {
            problems.push("retrieval.summary_top_k must be greater than zero".to_owned());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            bail!("invalid configuration: {}", problems.join("; "))
        }
    }
}

//! Configuration loading, secret resolution and the repository assistant.

pub mod assistant;
pub mod config;
pub mod languages;
pub mod vault;

pub use assistant::{AssistantError, ChatReply, RepoAssistant, RepositoryMetadata};
pub use config::Config;

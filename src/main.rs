use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use repochat_core::config::{Config, EndpointConfig};
use repochat_core::vault::{EnvVaultProvider, Secret};
use repochat_core::RepoAssistant;
use repochat_gateway::{AppState, GatewayServer};
use repochat_llm::AnyProvider;
use repochat_llm::openai::OpenAiProvider;
use repochat_memory::document::SplitterConfig;
use repochat_memory::{
    GithubLoader, IgnoreRules, IngestConfig, IngestionPipeline, QdrantOps, TextSplitter,
    UpsertBatching, VectorStore,
};
use tokio::sync::watch;

/// Chat with a GitHub repository through retrieval-augmented generation.
#[derive(Debug, Parser)]
#[command(name = "repochat", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Delete stored vectors: one namespace, or everything when omitted.
    Purge {
        #[arg(long)]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config);
    let mut config = Config::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config.resolve_secrets(&EnvVaultProvider).await?;
    config.validate()?;
    tracing::info!(config = %config_path.display(), "configuration loaded");

    let store = build_store(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, store).await,
        Command::Purge { namespace } => purge(store.as_ref(), namespace.as_deref()).await,
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("REPOCHAT_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn required<'a>(secret: Option<&'a Secret>, name: &str) -> anyhow::Result<&'a str> {
    secret
        .map(Secret::expose)
        .with_context(|| format!("{name} is not set"))
}

fn build_provider(endpoint: &EndpointConfig, api_key: &str, embeddings: bool) -> AnyProvider {
    let embedding_model = embeddings.then(|| endpoint.model.clone());
    let provider = OpenAiProvider::new(
        api_key.to_owned(),
        endpoint.base_url.clone(),
        endpoint.model.clone(),
        endpoint.max_tokens,
        embedding_model,
    )
    .with_client(repochat_llm::http::client_with_timeout(Duration::from_secs(
        endpoint.timeout_secs,
    )))
    .with_embed_batch_size(endpoint.batch_size)
    .with_max_attempts(endpoint.max_attempts);
    AnyProvider::OpenAi(provider)
}

fn build_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    let index = config
        .vector_store
        .index_name
        .as_deref()
        .context("vector store index name is not set")?;
    let api_key = config
        .secrets
        .vector_store_api_key
        .as_ref()
        .map(|s| s.expose().to_owned());
    let store = QdrantOps::new(&config.vector_store.url, api_key, index)
        .context("failed to create vector store client")?;
    Ok(Arc::new(store))
}

fn build_loader(config: &Config) -> anyhow::Result<GithubLoader> {
    let ignore = IgnoreRules::with_extra(&config.github.ignore)
        .context("invalid github.ignore pattern")?;
    Ok(GithubLoader::new()
        .with_base_url(config.github.api_base.clone())
        .with_concurrency(config.github.concurrency)
        .with_max_file_size(config.github.max_file_size)
        .with_ignore_rules(ignore))
}

fn build_state(
    config: &Config,
    store: Arc<dyn VectorStore>,
) -> anyhow::Result<AppState<AnyProvider>> {
    let embedding_key = required(
        config.secrets.embedding_api_key.as_ref(),
        "REPOCHAT_EMBEDDING_API_KEY",
    )?;
    let completion_key = required(
        config.secrets.completion_api_key.as_ref(),
        "REPOCHAT_COMPLETION_API_KEY",
    )?;
    let embedder = Arc::new(build_provider(&config.embedding, embedding_key, true));
    let completer = Arc::new(build_provider(&config.completion, completion_key, false));

    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: config.chunking.chunk_size,
        chunk_overlap: config.chunking.chunk_overlap,
        ..SplitterConfig::default()
    });
    let ingest = IngestConfig {
        upsert: UpsertBatching {
            batch_size: config.vector_store.upsert_batch_size,
            delay: Duration::from_millis(config.vector_store.upsert_delay_ms),
        },
    };
    let pipeline = IngestionPipeline::new(
        Arc::new(build_loader(config)?),
        splitter,
        Arc::clone(&embedder),
        Arc::clone(&store),
        ingest,
    );
    let assistant = RepoAssistant::new(embedder, completer, store, config.retrieval);

    Ok(AppState::new(
        Arc::new(pipeline),
        Arc::new(assistant),
        Duration::from_secs(config.server.ingest_timeout_secs),
    ))
}

async fn serve(config: &Config, store: Arc<dyn VectorStore>) -> anyhow::Result<()> {
    let state = build_state(config, store)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::new(
        &config.server.bind,
        config.server.port,
        state,
        shutdown_rx,
    )
    .with_rate_limit(config.server.rate_limit)
    .with_max_body_size(config.server.max_body_size)
    .serve()
    .await?;
    Ok(())
}

async fn purge(store: &dyn VectorStore, namespace: Option<&str>) -> anyhow::Result<()> {
    if let Some(ns) = namespace {
        let before = store.describe_stats(Some(ns)).await?.count(ns);
        store
            .delete_namespace(ns)
            .await
            .with_context(|| format!("failed to delete namespace {ns}"))?;
        tracing::info!(namespace = ns, records = before, "namespace purged");
    } else {
        let before = store.describe_stats(None).await?.total();
        store.delete_all().await.context("failed to delete all records")?;
        tracing::info!(records = before, "all namespaces purged");
    }
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use repochat_core::RepoAssistant;
use repochat_core::config::RetrievalConfig;
use repochat_llm::mock::MockProvider;
use repochat_memory::document::SplitterConfig;
use repochat_memory::{
    Document, IngestConfig, IngestionPipeline, InMemoryVectorStore, StaticLoader, TextSplitter,
    UpsertBatching,
};

use crate::server::AppState;

pub(crate) fn sample_docs() -> Vec<Document> {
    vec![
        Document::new(
            "src/server.ts",
            "import express from 'express';\nconst app = express();\napp.listen(3000);\n",
        ),
        Document::new("worker/jobs.py", "def run():\n    return 'done'\n"),
        Document::new("README.md", "# demo\n\nAn example service."),
    ]
}

pub(crate) fn test_state(
    provider: MockProvider,
) -> (AppState<MockProvider>, Arc<InMemoryVectorStore>, Arc<StaticLoader>) {
    let store = Arc::new(InMemoryVectorStore::new());
    let loader = Arc::new(StaticLoader::new(sample_docs()));
    let provider = Arc::new(provider);
    let splitter = TextSplitter::new(SplitterConfig {
        chunk_size: 60,
        chunk_overlap: 10,
        ..SplitterConfig::default()
    });
    let config = IngestConfig {
        upsert: UpsertBatching {
            batch_size: 2,
            delay: Duration::ZERO,
        },
    };
    let pipeline = IngestionPipeline::new(
        loader.clone(),
        splitter,
        provider.clone(),
        store.clone(),
        config,
    );
    let assistant = RepoAssistant::new(
        provider.clone(),
        provider,
        store.clone(),
        RetrievalConfig::default(),
    );
    let state = AppState::new(
        Arc::new(pipeline),
        Arc::new(assistant),
        Duration::from_secs(5),
    );
    (state, store, loader)
}

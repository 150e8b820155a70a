use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_server();
        self.apply_env_overrides_services();
    }

    fn apply_env_overrides_server(&mut self) {
        if let Ok(v) = std::env::var("REPOCHAT_BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("REPOCHAT_RATE_LIMIT")
            && let Ok(limit) = v.parse::<u32>()
        {
            self.server.rate_limit = limit;
        }
        if let Ok(v) = std::env::var("REPOCHAT_MAX_BODY_SIZE")
            && let Ok(bytes) = v.parse::<usize>()
        {
            self.server.max_body_size = bytes;
        }
        if let Ok(v) = std::env::var("REPOCHAT_INGEST_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.server.ingest_timeout_secs = secs;
        }
    }

    fn apply_env_overrides_services(&mut self) {
        if let Ok(v) = std::env::var("REPOCHAT_GITHUB_API_BASE") {
            self.github.api_base = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_GITHUB_CONCURRENCY") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => self.github.concurrency = n,
                _ => tracing::warn!("ignoring invalid REPOCHAT_GITHUB_CONCURRENCY value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("REPOCHAT_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_COMPLETION_BASE_URL") {
            self.completion.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_COMPLETION_MODEL") {
            self.completion.model = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_VECTOR_STORE_URL") {
            self.vector_store.url = v;
        }
        if let Ok(v) = std::env::var("REPOCHAT_CHAT_TOP_K")
            && let Ok(k) = v.parse::<u64>()
        {
            self.retrieval.chat_top_k = k;
        }
    }
}

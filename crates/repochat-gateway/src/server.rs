use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use repochat_core::RepoAssistant;
use repochat_llm::LlmProvider;
use repochat_memory::IngestionPipeline;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

/// Shared handler state. Every field is cheap to clone.
pub struct AppState<P> {
    pub(crate) pipeline: Arc<IngestionPipeline<P>>,
    pub(crate) assistant: Arc<RepoAssistant<P>>,
    pub(crate) started_at: Instant,
    pub(crate) ingest_timeout: Duration,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            assistant: Arc::clone(&self.assistant),
            started_at: self.started_at,
            ingest_timeout: self.ingest_timeout,
        }
    }
}

impl<P: LlmProvider + 'static> AppState<P> {
    #[must_use]
    pub fn new(
        pipeline: Arc<IngestionPipeline<P>>,
        assistant: Arc<RepoAssistant<P>>,
        ingest_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            assistant,
            started_at: Instant::now(),
            ingest_timeout,
        }
    }
}

pub struct GatewayServer<P> {
    addr: SocketAddr,
    rate_limit: u32,
    max_body_size: usize,
    state: AppState<P>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<P: LlmProvider + 'static> GatewayServer<P> {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        state: AppState<P>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("server binding to 0.0.0.0, reachable from other hosts");
        }

        Self {
            addr,
            rate_limit: 60,
            max_body_size: 1_048_576,
            state,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Start the HTTP server and run until the shutdown signal flips to `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let router = build_router(self.state, self.rate_limit, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("server shutting down");
        })
        .await
        .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

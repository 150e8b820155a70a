use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt as _;
use repochat_llm::{LlmProvider, Message};
use repochat_memory::{DEFAULT_NAMESPACE, IngestOutcome};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestRequest {
    pub repo_url: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestResponse {
    success: bool,
    message: &'static str,
    namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    already_ingested: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<usize>,
}

impl From<IngestOutcome> for IngestResponse {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome {
            IngestOutcome::Ingested {
                namespace,
                documents,
                chunks,
            } => Self {
                success: true,
                message: "Repository ingested successfully",
                namespace,
                already_ingested: None,
                documents: Some(documents),
                chunks: Some(chunks),
            },
            IngestOutcome::AlreadyIngested { namespace, .. } => Self {
                success: true,
                message: "Repository already ingested",
                namespace,
                already_ingested: Some(true),
                documents: None,
                chunks: None,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SummarizeRequest {
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Prior conversation turn. The client may not inject system messages.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HistoryMessage {
    role: HistoryRole,
    content: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum HistoryRole {
    User,
    Assistant,
}

impl From<HistoryMessage> for Message {
    fn from(msg: HistoryMessage) -> Self {
        match msg.role {
            HistoryRole::User => Message::user(msg.content),
            HistoryRole::Assistant => Message::assistant(msg.content),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<HistoryMessage>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

fn resolve_namespace(namespace: Option<String>) -> Result<String, ApiError> {
    match namespace {
        None => Ok(DEFAULT_NAMESPACE.to_owned()),
        Some(ns) if ns.trim().is_empty() => {
            Err(ApiError::validation("namespace must not be empty"))
        }
        Some(ns) => Ok(ns.trim().to_owned()),
    }
}

pub(crate) async fn ingest_handler<P: LlmProvider + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(req) = payload?;
    state
        .pipeline
        .validate(&req.repo_url, &req.token)
        .map_err(|e| ApiError::from_ingest(&e))?;

    // Detached so a dropped connection cannot leave a half-written namespace.
    let pipeline = state.pipeline.clone();
    let task = tokio::spawn(async move { pipeline.ingest(&req.repo_url, &req.token).await });

    match tokio::time::timeout(state.ingest_timeout, task).await {
        Ok(Ok(Ok(outcome))) => Ok(Json(outcome.into())),
        Ok(Ok(Err(e))) => Err(ApiError::from_ingest(&e)),
        Ok(Err(join_err)) => Err(ApiError::internal(
            "Ingestion failed",
            format!("ingestion task aborted: {join_err}"),
        )),
        Err(_) => Err(ApiError::internal(
            "Ingestion failed",
            format!(
                "ingestion timed out after {}s; it continues in the background",
                state.ingest_timeout.as_secs()
            ),
        )),
    }
}

pub(crate) async fn summarize_handler<P: LlmProvider + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let namespace = resolve_namespace(req.namespace)?;
    let metadata = state
        .assistant
        .summarize(&namespace)
        .await
        .map_err(|e| ApiError::from_assistant("Summarization failed", &e))?;
    Ok(Json(metadata).into_response())
}

pub(crate) async fn chat_handler<P: LlmProvider + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    if req.message.trim().is_empty() {
        return Err(ApiError::validation("message must not be empty"));
    }
    let namespace = resolve_namespace(req.namespace)?;
    let history: Vec<Message> = req
        .conversation_history
        .into_iter()
        .map(Message::from)
        .collect();

    if !req.stream {
        let reply = state
            .assistant
            .chat(&namespace, &req.message, &history)
            .await
            .map_err(|e| ApiError::from_assistant("Chat failed", &e))?;
        return Ok(Json(reply).into_response());
    }

    let stream = state
        .assistant
        .chat_stream(&namespace, &req.message, &history)
        .await
        .map_err(|e| ApiError::from_assistant("Chat failed", &e))?;
    let stream = stream.inspect(move |delta| {
        if let Err(e) = delta {
            tracing::warn!(namespace = %namespace, "chat stream aborted: {e}");
        }
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

pub(crate) async fn health_handler<P: LlmProvider + 'static>(
    State(state): State<AppState<P>>,
) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

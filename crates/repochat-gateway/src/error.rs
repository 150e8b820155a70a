use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use repochat_core::AssistantError;
use repochat_memory::DocumentError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    success: bool,
    message: &'static str,
    error: String,
}

/// A failed request: status, a short summary and the underlying detail.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub status: StatusCode,
    pub message: &'static str,
    pub error: String,
}

impl ApiError {
    pub(crate) fn validation(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid request",
            error: error.into(),
        }
    }

    pub(crate) fn internal(message: &'static str, error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
            error: error.into(),
        }
    }

    pub(crate) fn from_ingest(err: &DocumentError) -> Self {
        if err.is_validation() {
            Self::validation(err.to_string())
        } else {
            Self::internal("Ingestion failed", err.to_string())
        }
    }

    pub(crate) fn from_assistant(message: &'static str, err: &AssistantError) -> Self {
        if err.is_validation() {
            Self::validation(err.to_string())
        } else {
            Self::internal(message, err.to_string())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StatusCode::PAYLOAD_TOO_LARGE
        } else {
            StatusCode::BAD_REQUEST
        };
        Self {
            status,
            message: "Invalid request",
            error: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}: {}", self.message, self.error);
        } else {
            tracing::debug!(status = %self.status, "{}: {}", self.message, self.error);
        }
        let body = ErrorBody {
            success: false,
            message: self.message,
            error: self.error,
        };
        (self.status, Json(body)).into_response()
    }
}

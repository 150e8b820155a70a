use eventsource_stream::Eventsource;
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::ChatStream;

/// Convert a chat-completions streaming response into a `ChatStream` of text deltas.
pub(crate) fn openai_sse_to_stream(response: reqwest::Response) -> ChatStream {
    let event_stream = response.bytes_stream().eventsource();
    let mapped = event_stream.filter_map(|event| match event {
        Ok(event) => parse_openai_sse_event(&event.data),
        Err(e) => Some(Err(LlmError::SseParse(e.to_string()))),
    });
    Box::pin(mapped)
}

fn parse_openai_sse_event(data: &str) -> Option<Result<String, LlmError>> {
    if data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(StreamChunk {
            error: Some(err), ..
        }) => Some(Err(LlmError::SseParse(format!(
            "stream error: {}",
            err.message
        )))),
        Ok(chunk) => {
            let content = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .unwrap_or_default();
            (!content.is_empty()).then_some(Ok(content))
        }
        Err(e) => Some(Err(LlmError::SseParse(format!(
            "failed to parse SSE data: {e}"
        )))),
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamError {
    message: String,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn parse_text_chunk() {
        let data = r#"{"choices":[{"delta":{"content":"hi"},"finish_reason":null}]}"#;
        let result = parse_openai_sse_event(data);
        assert_eq!(result.unwrap().unwrap(), "hi");
    }

    #[test]
    fn parse_done_signal() {
        assert!(parse_openai_sse_event("[DONE]").is_none());
    }

    #[test]
    fn role_only_delta_skipped() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#;
        assert!(parse_openai_sse_event(data).is_none());
    }

    #[test]
    fn finish_chunk_skipped() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(parse_openai_sse_event(data).is_none());
    }

    #[test]
    fn error_chunk_surfaces_message() {
        let data = r#"{"error":{"message":"context length exceeded","type":"invalid_request_error"}}"#;
        let err = parse_openai_sse_event(data).unwrap().unwrap_err();
        assert!(err.to_string().contains("context length exceeded"));
    }

    #[test]
    fn invalid_json_is_error() {
        let err = parse_openai_sse_event("not json").unwrap().unwrap_err();
        assert!(err.to_string().contains("failed to parse SSE data"));
    }

    #[tokio::test]
    async fn stream_collects_deltas_in_order() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"The \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"repo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let response = reqwest::get(server.uri()).await.unwrap();
        let mut stream = openai_sse_to_stream(response);
        let mut collected = String::new();
        while let Some(delta) = stream.next().await {
            collected.push_str(&delta.unwrap());
        }
        assert_eq!(collected, "The repo");
    }
}

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message};
use crate::retry::{RetryPolicy, ensure_success, send_with_retry};
use crate::sse::openai_sse_to_stream;

const PROVIDER: &str = "openai";

/// Client for OpenAI-compatible `/chat/completions` and `/embeddings` endpoints.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    embedding_model: Option<String>,
    embed_batch_size: usize,
    retry: RetryPolicy,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("embedding_model", &self.embedding_model)
            .field("embed_batch_size", &self.embed_batch_size)
            .field("retry", &self.retry)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
            max_tokens,
            embedding_model,
            embed_batch_size: 50,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Maximum number of inputs sent in one `/embeddings` request. Zero is treated as one.
    #[must_use]
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    /// Total attempts per request, including the first one.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.retry.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry.base_backoff = base;
        self
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = send_with_retry(PROVIDER, self.retry, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
        })
        .await?;
        ensure_success(PROVIDER, response).await
    }

    async fn send_request(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response = self.post_json("chat/completions", &body).await?;
        let text = response.text().await?;
        let resp: ChatResponse = serde_json::from_str(&text)?;

        if let Some(usage) = resp.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn embed_chunk(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = EmbeddingRequest {
            input: inputs,
            model,
        };
        let response = self.post_json("embeddings", &body).await?;
        let text = response.text().await?;
        let resp: EmbeddingResponse = serde_json::from_str(&text)?;

        if resp.data.len() != inputs.len() {
            return Err(LlmError::EmbeddingCount {
                expected: inputs.len(),
                actual: resp.data.len(),
            });
        }

        let mut data = resp.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn embedding_model(&self) -> Result<&str, LlmError> {
        self.embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: PROVIDER })
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.send_request(messages).await
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
            stream: true,
        };
        let response = self.post_json("chat/completions", &body).await?;
        Ok(openai_sse_to_stream(response))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut vectors = self.embed_batch(&[text.to_owned()]).await?;
        vectors
            .pop()
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self.embedding_model()?;
        let mut vectors = Vec::with_capacity(texts.len());
        for (batch, inputs) in texts.chunks(self.embed_batch_size).enumerate() {
            tracing::debug!(batch, size = inputs.len(), "embedding batch");
            vectors.extend(self.embed_chunk(model, inputs).await?);
        }
        Ok(vectors)
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| ApiMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        })
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_stream::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test-key".into(),
            format!("{}/v1/", server.uri()),
            "gpt-4o-mini".into(),
            1024,
            Some("text-embedding-3-small".into()),
        )
        .with_retry_backoff(Duration::from_millis(1))
    }

    fn chat_body(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3}
        })
    }

    #[test]
    fn new_trims_trailing_slashes() {
        let p = OpenAiProvider::new(
            "k".into(),
            "https://api.openai.com/v1//".into(),
            "m".into(),
            1,
            None,
        );
        assert_eq!(p.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = OpenAiProvider::new(
            "sk-secret-value".into(),
            "https://api.openai.com/v1".into(),
            "m".into(),
            1,
            None,
        );
        let dbg = format!("{p:?}");
        assert!(!dbg.contains("sk-secret-value"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn chat_request_omits_stream_when_false() {
        let msgs = [Message::system("s"), Message::user("u")];
        let api = convert_messages(&msgs);
        let req = ChatRequest {
            model: "m",
            messages: &api,
            max_tokens: 5,
            stream: false,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("stream").is_none());
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "u");
    }

    #[test]
    fn embeddings_unsupported_without_model() {
        let p = OpenAiProvider::new("k".into(), "http://x".into(), "m".into(), 1, None);
        assert!(!p.supports_embeddings());
        assert!(matches!(
            p.embedding_model(),
            Err(LlmError::EmbedUnsupported { .. })
        ));
    }

    #[tokio::test]
    async fn chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test-key"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 1024})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("hello")))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider_for(&server);
        let out = p.chat(&[Message::user("hi")]).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn chat_with_no_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .chat(&[Message::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn chat_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("after retry")))
            .mount(&server)
            .await;

        let out = provider_for(&server)
            .chat(&[Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(out, "after retry");
    }

    #[tokio::test]
    async fn unauthorized_surfaces_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided: sk-test", "type": "invalid_request_error"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .chat(&[Message::user("hi")])
            .await
            .unwrap_err();
        match err {
            LlmError::Unauthorized { message, .. } => assert!(message.contains("Incorrect API key")),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_stream_yields_deltas() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let mut stream = provider_for(&server)
            .chat_stream(&[Message::user("hi")])
            .await
            .unwrap();
        let mut out = String::new();
        while let Some(delta) = stream.next().await {
            out.push_str(&delta.unwrap());
        }
        assert_eq!(out, "Hello");
    }

    #[tokio::test]
    async fn embed_batch_splits_requests_and_restores_order() {
        let server = MockServer::start().await;
        // Answer with the data array reversed so ordering must come from `index`.
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(|req: &Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                let inputs = body["input"].as_array().unwrap();
                let data: Vec<_> = inputs
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(i, text)| {
                        let len = text.as_str().unwrap().len();
                        json!({"index": i, "embedding": [len as f32, 0.0]})
                    })
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({"data": data}))
            })
            .expect(3)
            .mount(&server)
            .await;

        let p = provider_for(&server).with_embed_batch_size(2);
        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let vectors = p.embed_batch(&texts).await.unwrap();

        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn embed_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [0.1]}]
            })))
            .mount(&server)
            .await;

        let texts = vec!["one".to_owned(), "two".to_owned()];
        let err = provider_for(&server).embed_batch(&texts).await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::EmbeddingCount {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn embed_gives_up_after_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = provider_for(&server).embed("text").await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn embed_batch_of_nothing_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let vectors = provider_for(&server).embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}

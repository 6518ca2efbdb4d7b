use async_stream::stream;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::{debug, trace};

use crate::wire::{ChatChunk, ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse};
use crate::RelayError;

/// Stream of non-empty text fragments from a streamed completion.
pub type TokenStream = BoxStream<'static, String>;

/// Minimal client for an OpenAI-compatible service.
///
/// Bound to one base URL and bearer key. Proxying is disabled on the
/// underlying HTTP client so requests to localhost never detour through an
/// environment-configured proxy.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// One blocking (awaited in full) chat completion.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, RelayError> {
        let resp = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;
        Ok(resp)
    }

    /// A streamed chat completion, yielding each non-empty text delta.
    ///
    /// The returned stream is finite and cannot be restarted; it ends at the
    /// server's `[DONE]` sentinel or when the connection closes. Chunks
    /// without a delta are skipped.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<TokenStream, RelayError> {
        let mut request = request.clone();
        request.stream = true;
        let resp = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let mut bytes = resp.bytes_stream();
        let out = stream! {
            // Carry partial lines between network chunks; only complete
            // lines are decoded so multi-byte characters survive chunk
            // boundaries.
            let mut buf: Vec<u8> = Vec::new();
            let mut full = String::new();
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        debug!(error = %e, "chat stream error");
                        break;
                    }
                };
                buf.extend_from_slice(&chunk);
                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    let Some(data) = line.trim_end().strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim_start();
                    if data == "[DONE]" {
                        break 'read;
                    }
                    if let Ok(c) = serde_json::from_str::<ChatChunk>(data) {
                        if let Some(text) = c.delta_text() {
                            if !text.is_empty() {
                                trace!(token = %text, "stream delta");
                                full.push_str(text);
                                yield text.to_string();
                            }
                        }
                    }
                }
            }
            debug!(response = %full, "chat stream complete");
        };
        Ok(Box::pin(out))
    }

    /// One embeddings request.
    pub async fn embeddings(
        &self,
        request: &EmbeddingsRequest,
    ) -> Result<EmbeddingsResponse, RelayError> {
        let resp = self
            .http
            .post(self.url("embeddings"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbeddingsResponse>()
            .await?;
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Message;
    use futures_util::StreamExt;
    use httpmock::prelude::*;
    use serde_json::json;

    fn chat_request(stream: bool) -> ChatRequest {
        ChatRequest {
            model: "gpt-4".into(),
            messages: vec![Message::user("你好")],
            stream,
        }
    }

    #[tokio::test]
    async fn blocking_chat_parses_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "model": "gpt-4",
                    "choices": [{"message": {"role": "assistant", "content": "你好！"}}],
                    "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
                }));
            })
            .await;

        let client = OpenAiClient::new(server.url("/v1"), "sk-test").unwrap();
        let resp = client.chat(&chat_request(false)).await.unwrap();
        assert_eq!(resp.model, "gpt-4");
        assert_eq!(resp.text(), "你好！");
        assert_eq!(resp.usage.total_tokens, 12);
    }

    #[tokio::test]
    async fn streamed_chat_yields_non_empty_deltas_in_order() {
        let server = MockServer::start_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"你\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"好\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body(body);
            })
            .await;

        let client = OpenAiClient::new(server.url("/v1"), "sk-test").unwrap();
        let stream = client.chat_stream(&chat_request(true)).await.unwrap();
        let fragments: Vec<String> = stream.collect().await;
        assert_eq!(fragments, vec!["你".to_string(), "好".to_string()]);
    }

    #[tokio::test]
    async fn stream_flag_is_forced_on() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .body_contains("\"stream\":true");
                then.status(200)
                    .header("content-type", "text/event-stream")
                    .body("data: [DONE]\n\n");
            })
            .await;

        let client = OpenAiClient::new(server.url("/v1"), "sk-test").unwrap();
        // Caller passes stream = false; the client sets it before sending.
        let stream = client.chat_stream(&chat_request(false)).await.unwrap();
        let fragments: Vec<String> = stream.collect().await;
        assert!(fragments.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn embeddings_returns_vector_and_usage() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(200).json_body(json!({
                    "data": [{"embedding": [0.1, 0.2, 0.3, 0.4]}],
                    "usage": {"prompt_tokens": 4, "total_tokens": 4}
                }));
            })
            .await;

        let client = OpenAiClient::new(server.url("/v1"), "sk-test").unwrap();
        let resp = client
            .embeddings(&EmbeddingsRequest {
                model: "text-embedding-ada-002".into(),
                input: "Hello, world!".into(),
            })
            .await
            .unwrap();
        assert_eq!(resp.data[0].embedding.len(), 4);
        assert_eq!(resp.usage.prompt_tokens, 4);
    }

    #[tokio::test]
    async fn http_error_statuses_surface_as_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(401);
            })
            .await;

        let client = OpenAiClient::new(server.url("/v1"), "bad-key").unwrap();
        assert!(client.chat(&chat_request(false)).await.is_err());
    }
}

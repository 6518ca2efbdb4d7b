//! Serde models for the slice of the OpenAI API the probes consume.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    /// A user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

impl ChatResponse {
    /// Text of the first choice, or the empty string.
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

/// One server-sent chunk of a streamed completion.
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatChunk {
    /// The chunk's text delta, if it carries one.
    pub fn delta_text(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Token accounting reported by the service.
///
/// Embedding responses omit `completion_tokens`; it defaults to zero.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prompt_tokens={} completion_tokens={} total_tokens={}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingsResponse {
    pub data: Vec<Embedding>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct Embedding {
    pub embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_response() {
        let body = r#"{
            "model": "gpt-4",
            "choices": [{"message": {"role": "assistant", "content": "hi"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
        }"#;
        let resp: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.model, "gpt-4");
        assert_eq!(resp.text(), "hi");
        assert_eq!(
            resp.usage.prompt_tokens + resp.usage.completion_tokens,
            resp.usage.total_tokens
        );
    }

    #[test]
    fn chunk_without_content_has_no_delta() {
        let chunk: ChatChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(chunk.delta_text(), None);
        let empty: ChatChunk = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.delta_text(), None);
    }

    #[test]
    fn embeddings_usage_has_no_completion_tokens() {
        let body = r#"{
            "data": [{"embedding": [0.1, 0.2, 0.3]}],
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let resp: EmbeddingsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data[0].embedding.len(), 3);
        assert_eq!(resp.usage.completion_tokens, 0);
    }
}

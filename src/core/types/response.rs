//! Canonical chat response and stream chunk types

use super::chat::ChatMessage;
use super::tools::ToolCallDelta;
use serde::{Deserialize, Serialize};

/// Reason generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop or stop sequence
    Stop,
    /// Token limit reached
    Length,
    /// The model called tools
    ToolCalls,
    /// Content filtered by the upstream
    ContentFilter,
}

/// Token usage for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
    /// Sum of prompt and completion tokens
    pub total_tokens: u32,
}

impl Usage {
    /// Build usage from prompt and completion counts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens }
    }
}

/// One response alternative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Choice index
    pub index: u32,
    /// Generated message
    pub message: ChatMessage,
    /// Why generation stopped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Canonical chat response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response identifier
    pub id: String,
    /// Object tag, `chat.completion`
    #[serde(default = "ChatResponse::object_tag")]
    pub object: String,
    /// Creation time, Unix seconds
    pub created: i64,
    /// Model that produced the response
    pub model: String,
    /// Response alternatives
    pub choices: Vec<ChatChoice>,
    /// Token usage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    fn object_tag() -> String {
        "chat.completion".to_string()
    }

    /// Text of the first choice
    pub fn first_text(&self) -> String {
        self.choices.first().map(|c| c.message.text()).unwrap_or_default()
    }
}

/// Canonical stream chunk
///
/// The concatenation of every chunk's `delta` equals the full text of the
/// equivalent non-streamed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatChunk {
    /// Response identifier
    pub id: String,
    /// Model that produced the chunk
    pub model: String,
    /// Creation time, Unix seconds
    pub created: i64,
    /// Incremental text
    #[serde(default)]
    pub delta: String,
    /// Partial tool-call fragments keyed by accumulator index
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,
    /// Finish reason, present on the closing content chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Terminal usage, present at most once per stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// True on the terminal chunk
    #[serde(default)]
    pub done: bool,
}

impl ChatChunk {
    /// Terminal chunk closing the stream
    pub fn terminal(id: impl Into<String>, model: impl Into<String>, created: i64) -> Self {
        Self { id: id.into(), model: model.into(), created, done: true, ..Default::default() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_finish_reason_wire_names() {
        assert_eq!(serde_json::to_string(&FinishReason::ToolCalls).unwrap(), "\"tool_calls\"");
        assert_eq!(serde_json::to_string(&FinishReason::ContentFilter).unwrap(), "\"content_filter\"");
    }

    #[test]
    fn test_terminal_chunk() {
        let chunk = ChatChunk::terminal("id", "m", 0);
        assert!(chunk.done);
        assert!(chunk.delta.is_empty());
        assert!(chunk.finish_reason.is_none());
    }
}

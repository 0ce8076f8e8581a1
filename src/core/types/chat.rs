//! Canonical chat request and message types

use super::message::{MessageContent, MessageRole};
use super::tools::{ResponseFormat, Tool, ToolCall, ToolChoice};
use serde::{Deserialize, Serialize};

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: MessageRole,
    /// Message content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    /// Tool calls emitted by an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Call this message is the result of, for `tool` role messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// System message
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self { role: MessageRole::System, content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    /// User message
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self { role: MessageRole::User, content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    /// Assistant message
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self { role: MessageRole::Assistant, content: Some(content.into()), tool_calls: None, tool_call_id: None }
    }

    /// Tool-result message answering `tool_call_id`
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Concatenated text of the message content
    pub fn text(&self) -> String {
        self.content.as_ref().map(|c| c.as_text()).unwrap_or_default()
    }
}

/// Canonical chat request, independent of any vendor wire format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model name
    pub model: String,
    /// Ordered message list
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Presence penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Frequency penalty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Seed for reproducible generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Tool list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Tool selection directive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Response format hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// Enable streaming
    #[serde(default)]
    pub stream: bool,
    /// End-user tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ChatRequest {
    /// Create a request for `model` with no messages
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), ..Default::default() }
    }

    /// Append a message
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Append a user message
    pub fn with_user_message(self, content: impl Into<String>) -> Self {
        self.with_message(ChatMessage::user(content.into()))
    }

    /// Append a system message
    pub fn with_system_message(self, content: impl Into<String>) -> Self {
        self.with_message(ChatMessage::system(content.into()))
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable streaming
    pub fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Concatenated text of all messages, used as the cache key material
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.text()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Rough input token estimate from message lengths
    pub fn estimate_input_tokens(&self) -> u32 {
        let chars: usize = self.messages.iter().map(|m| m.text().len() + 16).sum();
        ((chars as f64) / 4.0).ceil() as u32
    }
}

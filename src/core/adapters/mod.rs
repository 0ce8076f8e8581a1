//! Wire-format adapters
//!
//! Adapters are pure translators between the canonical chat schema and one
//! vendor's wire schema, including streaming frames. They perform no I/O;
//! failures are value-returning error kinds.

pub mod anthropic;
pub mod openai;
pub mod sse;

#[cfg(test)]
mod tests;

use crate::core::types::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, Compatibility, FinishReason, Provider,
    ToolCallAccumulator, Usage,
};
use crate::utils::error::{GatewayError, Result};

pub use anthropic::{AnthropicAdapter, AnthropicModelMap};
pub use openai::OpenAiAdapter;

/// Translates between the canonical schema and one vendor wire schema
pub trait WireAdapter: Send + Sync {
    /// Wire compatibility this adapter serves
    fn compatibility(&self) -> Compatibility;

    /// Chat endpoint path appended to the provider base URL
    fn chat_path(&self) -> &'static str;

    /// Request headers for the provider, including auth
    fn headers(&self, provider: &Provider) -> Vec<(String, String)>;

    /// Encode a canonical request into the vendor body
    fn encode_request(&self, request: &ChatRequest) -> Result<serde_json::Value>;

    /// Decode a vendor response body into the canonical response
    fn decode_response(&self, body: &[u8]) -> Result<ChatResponse>;

    /// Create a decoder for one streamed response
    fn new_stream_decoder(&self, model: &str) -> Box<dyn StreamDecoder>;
}

/// Stateful decoder for one SSE stream
///
/// Fed one line at a time; each line may yield zero or more canonical chunks.
pub trait StreamDecoder: Send {
    /// Decode one SSE line
    fn decode_line(&mut self, line: &str) -> Result<Vec<ChatChunk>>;
}

/// Dispatch table from wire compatibility to adapter
pub struct AdapterSet {
    openai: OpenAiAdapter,
    anthropic: AnthropicAdapter,
}

impl AdapterSet {
    /// Build the dispatch table with the given Anthropic model map
    pub fn new(model_map: AnthropicModelMap) -> Self {
        Self { openai: OpenAiAdapter::new(), anthropic: AnthropicAdapter::new(model_map) }
    }

    /// Adapter for a compatibility; `unknown` providers cannot be dispatched
    pub fn get(&self, compatibility: Compatibility) -> Result<&dyn WireAdapter> {
        match compatibility {
            Compatibility::Openai => Ok(&self.openai),
            Compatibility::Anthropic => Ok(&self.anthropic),
            Compatibility::Unknown => Err(GatewayError::InvalidRequest(
                "provider wire compatibility is unknown".to_string(),
            )),
        }
    }
}

impl Default for AdapterSet {
    fn default() -> Self {
        Self::new(AnthropicModelMap::default())
    }
}

/// Fold a chunk sequence into the equivalent non-streamed response
///
/// Text deltas concatenate in order; tool-call fragments accumulate by index.
pub fn collect_chunks(chunks: &[ChatChunk]) -> ChatResponse {
    let mut text = String::new();
    let mut accumulator = ToolCallAccumulator::new();
    let mut finish_reason: Option<FinishReason> = None;
    let mut usage: Option<Usage> = None;
    let mut id = String::new();
    let mut model = String::new();
    let mut created = 0i64;

    for chunk in chunks {
        if id.is_empty() && !chunk.id.is_empty() {
            id = chunk.id.clone();
            model = chunk.model.clone();
            created = chunk.created;
        }
        text.push_str(&chunk.delta);
        for delta in &chunk.tool_calls {
            accumulator.push(delta);
        }
        if chunk.finish_reason.is_some() {
            finish_reason = chunk.finish_reason;
        }
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
    }

    let tool_calls = accumulator.finish();
    let message = ChatMessage {
        role: crate::core::types::MessageRole::Assistant,
        content: if text.is_empty() { None } else { Some(text.into()) },
        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        tool_call_id: None,
    };

    ChatResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model,
        choices: vec![crate::core::types::ChatChoice {
            index: 0,
            message,
            finish_reason: finish_reason.or(Some(FinishReason::Stop)),
        }],
        usage,
    }
}

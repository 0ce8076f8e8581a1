//! Canonical schema and domain records
//!
//! The canonical chat types are independent of any vendor wire format;
//! adapters translate them to and from the OpenAI and Anthropic shapes.

pub mod chat;
pub mod event;
pub mod logs;
pub mod message;
pub mod provider;
pub mod response;
pub mod tools;

pub use chat::{ChatMessage, ChatRequest};
pub use event::{Channel, Event, EventType};
pub use logs::{ProviderStats, RequestLog};
pub use message::{ContentPart, ImageUrl, MessageContent, MessageRole};
pub use provider::{
    AuthMode, Capabilities, Compatibility, Modality, ModelInfo, Provider, ProviderKind,
    ProviderStatus, RateLimit, RateLimitKind, RetryPolicy,
};
pub use response::{ChatChoice, ChatChunk, ChatResponse, FinishReason, Usage};
pub use tools::{
    FunctionCall, FunctionCallDelta, FunctionDef, ResponseFormat, ResponseFormatKind, Tool,
    ToolCall, ToolCallAccumulator, ToolCallDelta, ToolChoice, ToolChoiceFunction,
};

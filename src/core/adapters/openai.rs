//! OpenAI wire adapter
//!
//! The canonical schema is OpenAI-shaped, so request and response mapping is
//! close to identity. Streaming decodes SSE `data:` frames; the literal
//! `[DONE]` terminates the stream and becomes a canonical terminal chunk.

use super::sse;
use super::{StreamDecoder, WireAdapter};
use crate::core::types::{
    AuthMode, ChatChunk, ChatRequest, ChatResponse, Compatibility, FinishReason, Provider,
    ToolCallDelta, Usage,
};
use crate::utils::error::{GatewayError, Result};
use serde::Deserialize;

/// Adapter for OpenAI-compatible endpoints
#[derive(Debug, Clone, Default)]
pub struct OpenAiAdapter;

impl OpenAiAdapter {
    /// Create the adapter
    pub fn new() -> Self {
        Self
    }
}

impl WireAdapter for OpenAiAdapter {
    fn compatibility(&self) -> Compatibility {
        Compatibility::Openai
    }

    fn chat_path(&self) -> &'static str {
        "/v1/chat/completions"
    }

    fn headers(&self, provider: &Provider) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(key) = &provider.api_key {
            match provider.auth {
                AuthMode::None => {}
                // OpenAI-compatible endpoints take every key shape as a
                // bearer token
                AuthMode::ApiKey | AuthMode::Bearer | AuthMode::Oauth2 => {
                    headers.push(("Authorization".to_string(), format!("Bearer {}", key)));
                }
            }
        }
        headers
    }

    fn encode_request(&self, request: &ChatRequest) -> Result<serde_json::Value> {
        if request.messages.is_empty() {
            return Err(GatewayError::InvalidRequest("messages cannot be empty".to_string()));
        }
        Ok(serde_json::to_value(request)?)
    }

    fn decode_response(&self, body: &[u8]) -> Result<ChatResponse> {
        Ok(serde_json::from_slice(body)?)
    }

    fn new_stream_decoder(&self, model: &str) -> Box<dyn StreamDecoder> {
        Box::new(OpenAiStreamDecoder { model: model.to_string(), id: String::new(), created: 0 })
    }
}

/// Wire shape of one streamed OpenAI chunk
#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<WireChunkChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChunkChoice {
    #[serde(default)]
    delta: WireDelta,
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Decoder for one OpenAI SSE stream
struct OpenAiStreamDecoder {
    model: String,
    id: String,
    created: i64,
}

impl StreamDecoder for OpenAiStreamDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Vec<ChatChunk>> {
        let Some(payload) = sse::data_payload(line) else {
            return Ok(Vec::new());
        };

        if payload == "[DONE]" {
            return Ok(vec![ChatChunk::terminal(self.id.clone(), self.model.clone(), self.created)]);
        }

        let wire: WireChunk = serde_json::from_str(payload)?;
        if !wire.id.is_empty() {
            self.id = wire.id.clone();
        }
        if wire.created != 0 {
            self.created = wire.created;
        }
        if !wire.model.is_empty() {
            self.model = wire.model.clone();
        }

        let mut chunk = ChatChunk {
            id: self.id.clone(),
            model: self.model.clone(),
            created: self.created,
            usage: wire.usage,
            ..Default::default()
        };
        if let Some(choice) = wire.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                chunk.delta = content;
            }
            if let Some(tool_calls) = choice.delta.tool_calls {
                chunk.tool_calls = tool_calls;
            }
            chunk.finish_reason = choice.finish_reason;
        }
        Ok(vec![chunk])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ChatMessage;

    fn provider_with_key(auth: AuthMode) -> Provider {
        let mut provider = Provider::new("p", "https://api.test.io", Compatibility::Openai);
        provider.auth = auth;
        provider.api_key = Some("sk-test".to_string());
        provider
    }

    #[test]
    fn test_headers_bearer_auth() {
        let adapter = OpenAiAdapter::new();
        let headers = adapter.headers(&provider_with_key(AuthMode::Bearer));
        assert!(headers.contains(&("Authorization".to_string(), "Bearer sk-test".to_string())));
    }

    #[test]
    fn test_headers_no_auth_omits_authorization() {
        let adapter = OpenAiAdapter::new();
        let mut provider = provider_with_key(AuthMode::None);
        provider.api_key = None;
        let headers = adapter.headers(&provider);
        assert!(headers.iter().all(|(name, _)| name != "Authorization"));
    }

    #[test]
    fn test_encode_rejects_empty_messages() {
        let adapter = OpenAiAdapter::new();
        let request = ChatRequest::new("gpt-4");
        assert!(matches!(adapter.encode_request(&request), Err(GatewayError::InvalidRequest(_))));
    }

    #[test]
    fn test_encode_is_identity_shaped() {
        let adapter = OpenAiAdapter::new();
        let request = ChatRequest::new("gpt-4").with_message(ChatMessage::user("hi")).with_max_tokens(10);
        let value = adapter.encode_request(&request).unwrap();
        assert_eq!(value["model"], "gpt-4");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 10);
    }

    #[test]
    fn test_decode_response() {
        let adapter = OpenAiAdapter::new();
        let body = serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Paris." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12 }
        });
        let response = adapter.decode_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(response.first_text(), "Paris.");
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn test_stream_decode_text_and_done() {
        let adapter = OpenAiAdapter::new();
        let mut decoder = adapter.new_stream_decoder("gpt-4");

        let lines = [
            r#"data: {"id":"c1","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"},"finish_reason":null}]}"#,
            r#"data: {"id":"c1","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":null}]}"#,
            r#"data: {"id":"c1","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
            "data: [DONE]",
        ];

        let mut chunks = Vec::new();
        for line in lines {
            chunks.extend(decoder.decode_line(line).unwrap());
        }

        let text: String = chunks.iter().map(|c| c.delta.as_str()).collect();
        assert_eq!(text, "Hello");
        assert_eq!(chunks[2].finish_reason, Some(FinishReason::Stop));
        assert!(chunks.last().unwrap().done);
        assert_eq!(chunks.last().unwrap().id, "c1");
    }

    #[test]
    fn test_stream_decode_tool_call_fragments() {
        let adapter = OpenAiAdapter::new();
        let mut decoder = adapter.new_stream_decoder("gpt-4");

        let line = r#"data: {"id":"c1","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":""}}]},"finish_reason":null}]}"#;
        let chunks = decoder.decode_line(line).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].tool_calls.len(), 1);
        assert_eq!(chunks[0].tool_calls[0].id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_stream_ignores_non_data_lines() {
        let adapter = OpenAiAdapter::new();
        let mut decoder = adapter.new_stream_decoder("gpt-4");
        assert!(decoder.decode_line("").unwrap().is_empty());
        assert!(decoder.decode_line(": keepalive").unwrap().is_empty());
    }
}

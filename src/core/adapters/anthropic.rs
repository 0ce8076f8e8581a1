//! Anthropic wire adapter
//!
//! Translation is asymmetric: system messages move out of the message list
//! into the `system` parameter, tool calls and tool results become content
//! blocks, and model names pass through a configurable mapping table.

use super::sse;
use super::{StreamDecoder, WireAdapter};
use crate::core::types::{
    AuthMode, ChatChunk, ChatMessage, ChatRequest, ChatResponse, Compatibility, ContentPart,
    FinishReason, FunctionCall, FunctionCallDelta, ImageUrl, MessageContent, MessageRole,
    Provider, Tool, ToolCall, ToolCallDelta, ToolChoice, Usage,
};
use crate::utils::error::{GatewayError, Result};
use serde_json::{json, Value};

/// Wire API version sent with every Anthropic request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model-name mapping for requests addressed with OpenAI-style names
#[derive(Debug, Clone)]
pub struct AnthropicModelMap {
    table: Vec<(String, String)>,
    default_model: String,
}

impl AnthropicModelMap {
    /// Build a map from explicit pairs and a fallback model
    pub fn new(table: Vec<(String, String)>, default_model: impl Into<String>) -> Self {
        Self { table, default_model: default_model.into() }
    }

    /// Resolve a requested model name to an Anthropic model
    ///
    /// Table entries win; unknown `claude-` names pass through; anything else
    /// falls back to the default model.
    pub fn resolve(&self, model: &str) -> String {
        if let Some((_, mapped)) = self.table.iter().find(|(from, _)| from == model) {
            return mapped.clone();
        }
        if model.starts_with("claude-") {
            return model.to_string();
        }
        self.default_model.clone()
    }
}

impl Default for AnthropicModelMap {
    fn default() -> Self {
        Self::new(
            vec![
                ("gpt-4".to_string(), "claude-3-opus-20240229".to_string()),
                ("gpt-4o".to_string(), "claude-3-5-sonnet-20241022".to_string()),
                ("gpt-3.5-turbo".to_string(), "claude-3-5-haiku-20241022".to_string()),
            ],
            "claude-3-5-sonnet-20241022",
        )
    }
}

/// Adapter for Anthropic-native endpoints
#[derive(Debug, Clone)]
pub struct AnthropicAdapter {
    model_map: AnthropicModelMap,
}

impl AnthropicAdapter {
    /// Create the adapter with a model map
    pub fn new(model_map: AnthropicModelMap) -> Self {
        Self { model_map }
    }

    fn encode_content(&self, message: &ChatMessage) -> Result<Value> {
        match &message.content {
            Some(MessageContent::Text(text)) => Ok(Value::String(text.clone())),
            Some(MessageContent::Parts(parts)) => {
                let mut blocks = Vec::new();
                for part in parts {
                    match part {
                        ContentPart::Text { text } => {
                            blocks.push(json!({ "type": "text", "text": text }));
                        }
                        ContentPart::ImageUrl { image_url } => {
                            blocks.push(self.encode_image(image_url)?);
                        }
                    }
                }
                Ok(Value::Array(blocks))
            }
            None => Ok(Value::String(String::new())),
        }
    }

    fn encode_image(&self, image: &ImageUrl) -> Result<Value> {
        if let Some((media_type, data)) = image.as_data_url() {
            Ok(json!({
                "type": "image",
                "source": { "type": "base64", "media_type": media_type, "data": data }
            }))
        } else {
            Ok(json!({
                "type": "image",
                "source": { "type": "url", "url": image.url }
            }))
        }
    }

    fn encode_assistant(&self, message: &ChatMessage) -> Result<Value> {
        let mut blocks = Vec::new();
        let text = message.text();
        if !text.is_empty() {
            blocks.push(json!({ "type": "text", "text": text }));
        }
        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                let input: Value = serde_json::from_str(&call.function.arguments).map_err(|e| {
                    GatewayError::InvalidRequest(format!(
                        "tool call {} has non-JSON arguments: {}",
                        call.id, e
                    ))
                })?;
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.function.name,
                    "input": input,
                }));
            }
        }
        Ok(json!({ "role": "assistant", "content": blocks }))
    }

    fn encode_tool_result(&self, message: &ChatMessage) -> Result<Value> {
        let tool_call_id = message.tool_call_id.as_ref().ok_or_else(|| {
            GatewayError::InvalidRequest("tool message is missing tool_call_id".to_string())
        })?;
        Ok(json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": tool_call_id,
                "content": message.text(),
            }]
        }))
    }

    fn encode_tools(&self, tools: &[Tool]) -> Value {
        Value::Array(
            tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.function.name,
                        "description": tool.function.description.clone().unwrap_or_default(),
                        "input_schema": tool.function.parameters,
                    })
                })
                .collect(),
        )
    }

    fn encode_tool_choice(&self, choice: &ToolChoice) -> Option<Value> {
        match choice {
            ToolChoice::Mode(mode) => match mode.as_str() {
                "auto" => Some(json!({ "type": "auto" })),
                "required" => Some(json!({ "type": "any" })),
                _ => None,
            },
            ToolChoice::Function { function, .. } => {
                Some(json!({ "type": "tool", "name": function.name }))
            }
        }
    }

    /// Decode an Anthropic request body back into the canonical schema
    ///
    /// The inverse of `encode_request` on the fields both formats support;
    /// the model name stays in Anthropic terms.
    pub fn decode_request(&self, body: &Value) -> Result<ChatRequest> {
        let mut request = ChatRequest::new(body["model"].as_str().unwrap_or_default());
        if let Some(system) = body["system"].as_str() {
            request.messages.push(ChatMessage::system(system));
        }
        request.max_tokens = body["max_tokens"].as_u64().map(|v| v as u32);
        request.temperature = body["temperature"].as_f64().map(|v| v as f32);
        request.top_p = body["top_p"].as_f64().map(|v| v as f32);
        if let Some(stops) = body["stop_sequences"].as_array() {
            request.stop =
                Some(stops.iter().filter_map(|s| s.as_str().map(String::from)).collect());
        }
        request.stream = body["stream"].as_bool().unwrap_or(false);

        for message in body["messages"].as_array().into_iter().flatten() {
            let role = message["role"].as_str().unwrap_or_default();
            match &message["content"] {
                Value::String(text) => {
                    let decoded = match role {
                        "assistant" => ChatMessage::assistant(text.clone()),
                        _ => ChatMessage::user(text.clone()),
                    };
                    request.messages.push(decoded);
                }
                Value::Array(blocks) => {
                    request.messages.extend(self.decode_blocks(role, blocks)?);
                }
                _ => {}
            }
        }
        Ok(request)
    }

    fn decode_blocks(&self, role: &str, blocks: &[Value]) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::new();
        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in blocks {
            match block["type"].as_str().unwrap_or_default() {
                "text" => parts.push(ContentPart::Text {
                    text: block["text"].as_str().unwrap_or_default().to_string(),
                }),
                "image" => {
                    let source = &block["source"];
                    let url = if source["type"] == "base64" {
                        format!(
                            "data:{};base64,{}",
                            source["media_type"].as_str().unwrap_or_default(),
                            source["data"].as_str().unwrap_or_default()
                        )
                    } else {
                        source["url"].as_str().unwrap_or_default().to_string()
                    };
                    parts.push(ContentPart::ImageUrl { image_url: ImageUrl { url, detail: None } });
                }
                "tool_use" => tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        arguments: block["input"].to_string(),
                    },
                }),
                "tool_result" => messages.push(ChatMessage::tool(
                    block["tool_use_id"].as_str().unwrap_or_default(),
                    block["content"].as_str().unwrap_or_default(),
                )),
                _ => {}
            }
        }

        if !parts.is_empty() || !tool_calls.is_empty() {
            let content = match parts.len() {
                0 => None,
                1 => match &parts[0] {
                    ContentPart::Text { text } => Some(MessageContent::Text(text.clone())),
                    _ => Some(MessageContent::Parts(parts)),
                },
                _ => Some(MessageContent::Parts(parts)),
            };
            messages.insert(
                0,
                ChatMessage {
                    role: if role == "assistant" { MessageRole::Assistant } else { MessageRole::User },
                    content,
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                    tool_call_id: None,
                },
            );
        }
        Ok(messages)
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new(AnthropicModelMap::default())
    }
}

/// Map an Anthropic stop reason to the canonical finish reason
pub fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

impl WireAdapter for AnthropicAdapter {
    fn compatibility(&self) -> Compatibility {
        Compatibility::Anthropic
    }

    fn chat_path(&self) -> &'static str {
        "/v1/messages"
    }

    fn headers(&self, provider: &Provider) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ];
        if let Some(key) = &provider.api_key {
            match provider.auth {
                AuthMode::None => {}
                AuthMode::Bearer | AuthMode::Oauth2 => {
                    headers.push(("Authorization".to_string(), format!("Bearer {}", key)));
                }
                AuthMode::ApiKey => headers.push(("x-api-key".to_string(), key.clone())),
            }
        }
        headers
    }

    fn encode_request(&self, request: &ChatRequest) -> Result<Value> {
        let system: Vec<String> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.text())
            .collect();

        let remaining: Vec<&ChatMessage> =
            request.messages.iter().filter(|m| m.role != MessageRole::System).collect();

        match remaining.first() {
            None => {
                return Err(GatewayError::InvalidRequest(
                    "request has no non-system messages".to_string(),
                ))
            }
            Some(first) if first.role != MessageRole::User => {
                return Err(GatewayError::InvalidRequest(format!(
                    "first non-system message must have role user, got {}",
                    first.role.as_str()
                )))
            }
            Some(_) => {}
        }

        let mut messages = Vec::new();
        for message in remaining {
            let encoded = match message.role {
                MessageRole::User => {
                    json!({ "role": "user", "content": self.encode_content(message)? })
                }
                MessageRole::Assistant => self.encode_assistant(message)?,
                MessageRole::Tool => self.encode_tool_result(message)?,
                MessageRole::System => unreachable!("system messages were filtered"),
            };
            messages.push(encoded);
        }

        let mut body = json!({
            "model": self.model_map.resolve(&request.model),
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });

        if !system.is_empty() {
            body["system"] = Value::String(system.join("\n\n"));
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(stop) = &request.stop {
            body["stop_sequences"] = json!(stop);
        }
        if request.stream {
            body["stream"] = json!(true);
        }
        if let Some(tools) = &request.tools {
            body["tools"] = self.encode_tools(tools);
            if let Some(choice) = request.tool_choice.as_ref().and_then(|c| self.encode_tool_choice(c)) {
                body["tool_choice"] = choice;
            }
        }
        Ok(body)
    }

    fn decode_response(&self, body: &[u8]) -> Result<ChatResponse> {
        let value: Value = serde_json::from_slice(body)?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for block in value["content"].as_array().into_iter().flatten() {
            match block["type"].as_str().unwrap_or_default() {
                "text" => text.push_str(block["text"].as_str().unwrap_or_default()),
                "tool_use" => tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    kind: "function".to_string(),
                    function: FunctionCall {
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        arguments: block["input"].to_string(),
                    },
                }),
                _ => {}
            }
        }

        let usage = value.get("usage").map(|u| {
            Usage::new(
                u["input_tokens"].as_u64().unwrap_or(0) as u32,
                u["output_tokens"].as_u64().unwrap_or(0) as u32,
            )
        });

        let message = ChatMessage {
            role: MessageRole::Assistant,
            content: if text.is_empty() { None } else { Some(text.into()) },
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
            tool_call_id: None,
        };

        Ok(ChatResponse {
            id: value["id"].as_str().unwrap_or_default().to_string(),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: value["model"].as_str().unwrap_or_default().to_string(),
            choices: vec![crate::core::types::ChatChoice {
                index: 0,
                message,
                finish_reason: value["stop_reason"].as_str().map(map_stop_reason),
            }],
            usage,
        })
    }

    fn new_stream_decoder(&self, model: &str) -> Box<dyn StreamDecoder> {
        Box::new(AnthropicStreamDecoder {
            model: model.to_string(),
            message_id: String::new(),
            created: chrono::Utc::now().timestamp(),
            input_tokens: 0,
        })
    }
}

/// Decoder for one Anthropic SSE stream
///
/// Events translate to canonical chunks whose concatenated deltas equal the
/// full text of the equivalent non-streamed call.
struct AnthropicStreamDecoder {
    model: String,
    message_id: String,
    created: i64,
    input_tokens: u32,
}

impl AnthropicStreamDecoder {
    fn base_chunk(&self) -> ChatChunk {
        ChatChunk {
            id: self.message_id.clone(),
            model: self.model.clone(),
            created: self.created,
            ..Default::default()
        }
    }
}

impl StreamDecoder for AnthropicStreamDecoder {
    fn decode_line(&mut self, line: &str) -> Result<Vec<ChatChunk>> {
        let Some(payload) = sse::data_payload(line) else {
            return Ok(Vec::new());
        };
        let event: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            // Non-JSON payloads are keepalives in practice
            Err(_) => return Ok(Vec::new()),
        };

        match event["type"].as_str().unwrap_or_default() {
            "message_start" => {
                if let Some(id) = event["message"]["id"].as_str() {
                    self.message_id = id.to_string();
                }
                self.input_tokens =
                    event["message"]["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
                Ok(Vec::new())
            }
            "content_block_start" => {
                let block = &event["content_block"];
                if block["type"] == "tool_use" {
                    let index = event["index"].as_u64().unwrap_or(0) as u32;
                    let mut chunk = self.base_chunk();
                    chunk.tool_calls = vec![ToolCallDelta {
                        index: Some(index),
                        id: block["id"].as_str().map(String::from),
                        kind: Some("function".to_string()),
                        function: Some(FunctionCallDelta {
                            name: block["name"].as_str().map(String::from),
                            arguments: None,
                        }),
                    }];
                    Ok(vec![chunk])
                } else {
                    Ok(Vec::new())
                }
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str().unwrap_or_default() {
                    "text_delta" => {
                        let mut chunk = self.base_chunk();
                        chunk.delta = delta["text"].as_str().unwrap_or_default().to_string();
                        Ok(vec![chunk])
                    }
                    "input_json_delta" => {
                        let index = event["index"].as_u64().unwrap_or(0) as u32;
                        let mut chunk = self.base_chunk();
                        chunk.tool_calls = vec![ToolCallDelta {
                            index: Some(index),
                            id: None,
                            kind: None,
                            function: Some(FunctionCallDelta {
                                name: None,
                                arguments: delta["partial_json"].as_str().map(String::from),
                            }),
                        }];
                        Ok(vec![chunk])
                    }
                    _ => Ok(Vec::new()),
                }
            }
            "message_delta" => {
                let mut chunk = self.base_chunk();
                chunk.finish_reason = event["delta"]["stop_reason"].as_str().map(map_stop_reason);
                let output_tokens = event["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;
                chunk.usage = Some(Usage::new(self.input_tokens, output_tokens));
                Ok(vec![chunk])
            }
            "message_stop" => {
                Ok(vec![ChatChunk::terminal(self.message_id.clone(), self.model.clone(), self.created)])
            }
            "error" => {
                let message = event["error"]["message"].as_str().unwrap_or("unknown stream error");
                Err(GatewayError::ServiceUnavailable(message.to_string()))
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::default()
    }

    #[test]
    fn test_model_map_resolution() {
        let map = AnthropicModelMap::default();
        assert_eq!(map.resolve("gpt-4"), "claude-3-opus-20240229");
        assert_eq!(map.resolve("gpt-3.5-turbo"), "claude-3-5-haiku-20241022");
        assert_eq!(map.resolve("claude-3-opus-custom"), "claude-3-opus-custom");
        assert_eq!(map.resolve("llama-70b"), "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn test_system_extraction_and_join() {
        let request = ChatRequest::new("claude-3-opus-20240229")
            .with_system_message("S1")
            .with_system_message("S2")
            .with_user_message("hi");
        let body = adapter().encode_request(&request).unwrap();
        assert_eq!(body["system"], "S1\n\nS2");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_first_message_must_be_user() {
        let request = ChatRequest::new("claude-3-opus-20240229")
            .with_system_message("S")
            .with_message(ChatMessage::assistant("A"));
        let error = adapter().encode_request(&request).unwrap_err();
        assert!(matches!(error, GatewayError::InvalidRequest(_)));
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("end_turn"), FinishReason::Stop);
        assert_eq!(map_stop_reason("stop_sequence"), FinishReason::Stop);
        assert_eq!(map_stop_reason("max_tokens"), FinishReason::Length);
        assert_eq!(map_stop_reason("tool_use"), FinishReason::ToolCalls);
    }

    #[test]
    fn test_tool_call_becomes_tool_use_block() {
        let mut assistant = ChatMessage::assistant("checking");
        assistant.tool_calls = Some(vec![ToolCall {
            id: "toolu_1".to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: "get_weather".to_string(),
                arguments: r#"{"city":"Paris"}"#.to_string(),
            },
        }]);
        let request = ChatRequest::new("claude-3-opus-20240229")
            .with_user_message("weather?")
            .with_message(assistant)
            .with_message(ChatMessage::tool("toolu_1", "sunny"));

        let body = adapter().encode_request(&request).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[1]["content"][1]["type"], "tool_use");
        assert_eq!(messages[1]["content"][1]["input"]["city"], "Paris");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn test_data_url_image_becomes_base64_block() {
        let request = ChatRequest::new("claude-3-opus-20240229").with_message(ChatMessage {
            role: MessageRole::User,
            content: Some(MessageContent::Parts(vec![
                ContentPart::Text { text: "what is this".to_string() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/jpeg;base64,Zm9v".to_string(),
                        detail: None,
                    },
                },
            ])),
            tool_calls: None,
            tool_call_id: None,
        });

        let body = adapter().encode_request(&request).unwrap();
        let image = &body["messages"][0]["content"][1];
        assert_eq!(image["type"], "image");
        assert_eq!(image["source"]["type"], "base64");
        assert_eq!(image["source"]["media_type"], "image/jpeg");
        assert_eq!(image["source"]["data"], "Zm9v");
    }

    #[test]
    fn test_invalid_tool_arguments_rejected() {
        let mut assistant = ChatMessage::assistant("");
        assistant.tool_calls = Some(vec![ToolCall {
            id: "t".to_string(),
            kind: "function".to_string(),
            function: FunctionCall { name: "f".to_string(), arguments: "not json".to_string() },
        }]);
        let request = ChatRequest::new("claude-3-opus-20240229")
            .with_user_message("u")
            .with_message(assistant);
        assert!(adapter().encode_request(&request).is_err());
    }

    #[test]
    fn test_decode_response_with_tool_use() {
        let body = serde_json::json!({
            "id": "msg_1",
            "model": "claude-3-opus-20240229",
            "content": [
                { "type": "text", "text": "Let me check." },
                { "type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Paris"} }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 20, "output_tokens": 10 }
        });
        let response = adapter().decode_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(response.first_text(), "Let me check.");
        assert_eq!(response.choices[0].finish_reason, Some(FinishReason::ToolCalls));
        let calls = response.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(response.usage.unwrap().total_tokens, 30);
    }

    #[test]
    fn test_stream_concatenation_matches_full_text() {
        let anthropic = adapter();
        let mut decoder = anthropic.new_stream_decoder("claude-3-opus-20240229");

        let lines = [
            r#"data: {"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":12}}}"#,
            r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"text"}}"#,
            r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Par"}}"#,
            r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"is."}}"#,
            r#"data: {"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":4}}"#,
            r#"data: {"type":"message_stop"}"#,
        ];

        let mut chunks = Vec::new();
        for line in lines {
            chunks.extend(decoder.decode_line(line).unwrap());
        }

        let text: String = chunks.iter().map(|c| c.delta.as_str()).collect();
        assert_eq!(text, "Paris.");
        assert_eq!(chunks.iter().find_map(|c| c.finish_reason), Some(FinishReason::Stop));
        let usage = chunks.iter().find_map(|c| c.usage).unwrap();
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 4);
        assert!(chunks.last().unwrap().done);
        assert_eq!(chunks.last().unwrap().id, "msg_1");
    }

    #[test]
    fn test_stream_error_event_surfaces() {
        let anthropic = adapter();
        let mut decoder = anthropic.new_stream_decoder("claude-3-opus-20240229");
        let result = decoder
            .decode_line(r#"data: {"type":"error","error":{"message":"overloaded"}}"#);
        assert!(matches!(result, Err(GatewayError::ServiceUnavailable(_))));
    }
}

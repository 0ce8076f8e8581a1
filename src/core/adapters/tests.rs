//! Cross-adapter properties: round-trip identity and stream aggregation

use super::*;
use crate::core::types::{ChatMessage, MessageRole};

#[test]
fn test_anthropic_round_trip_preserves_messages() {
    let adapter = AnthropicAdapter::default();
    let request = ChatRequest::new("claude-3-opus-20240229")
        .with_system_message("S")
        .with_user_message("U1")
        .with_message(ChatMessage::assistant("A1"))
        .with_user_message("U2")
        .with_max_tokens(256);

    let encoded = adapter.encode_request(&request).unwrap();
    let decoded = adapter.decode_request(&encoded).unwrap();

    assert_eq!(decoded.model, "claude-3-opus-20240229");
    assert_eq!(decoded.max_tokens, Some(256));
    assert_eq!(decoded.messages.len(), request.messages.len());
    for (original, round_tripped) in request.messages.iter().zip(decoded.messages.iter()) {
        assert_eq!(original.role, round_tripped.role);
        assert_eq!(original.text(), round_tripped.text());
    }
}

#[test]
fn test_anthropic_round_trip_preserves_tool_flow() {
    let adapter = AnthropicAdapter::default();
    let mut assistant = ChatMessage::assistant("checking");
    assistant.tool_calls = Some(vec![crate::core::types::ToolCall {
        id: "toolu_1".to_string(),
        kind: "function".to_string(),
        function: crate::core::types::FunctionCall {
            name: "lookup".to_string(),
            arguments: r#"{"q":"x"}"#.to_string(),
        },
    }]);
    let request = ChatRequest::new("claude-3-opus-20240229")
        .with_user_message("U")
        .with_message(assistant)
        .with_message(ChatMessage::tool("toolu_1", "result"));

    let decoded = adapter.decode_request(&adapter.encode_request(&request).unwrap()).unwrap();

    let assistant_back = decoded.messages.iter().find(|m| m.role == MessageRole::Assistant).unwrap();
    let calls = assistant_back.tool_calls.as_ref().unwrap();
    assert_eq!(calls[0].id, "toolu_1");
    assert_eq!(calls[0].function.name, "lookup");

    let tool_back = decoded.messages.iter().find(|m| m.role == MessageRole::Tool).unwrap();
    assert_eq!(tool_back.tool_call_id.as_deref(), Some("toolu_1"));
    assert_eq!(tool_back.text(), "result");
}

#[test]
fn test_collect_chunks_concatenates_stream_text() {
    let adapter = OpenAiAdapter::new();
    let mut decoder = adapter.new_stream_decoder("gpt-4");

    let lines = [
        r#"data: {"id":"c1","created":7,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"The answer "},"finish_reason":null}]}"#,
        r#"data: {"id":"c1","created":7,"model":"gpt-4","choices":[{"index":0,"delta":{"content":"is 42."},"finish_reason":null}]}"#,
        r#"data: {"id":"c1","created":7,"model":"gpt-4","choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":4,"total_tokens":9}}"#,
        "data: [DONE]",
    ];
    let mut chunks = Vec::new();
    for line in lines {
        chunks.extend(decoder.decode_line(line).unwrap());
    }

    let response = collect_chunks(&chunks);
    assert_eq!(response.choices[0].message.text(), "The answer is 42.");
    assert_eq!(response.choices[0].finish_reason, Some(FinishReason::Stop));
    assert_eq!(response.usage.unwrap().total_tokens, 9);
    assert_eq!(response.id, "c1");
}

#[test]
fn test_collect_chunks_assembles_tool_calls() {
    let adapter = OpenAiAdapter::new();
    let mut decoder = adapter.new_stream_decoder("gpt-4");

    let lines = [
        r#"data: {"id":"c1","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":"{\"ci"}}]},"finish_reason":null}]}"#,
        r#"data: {"id":"c1","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ty\":\"Paris\"}"}}]},"finish_reason":null}]}"#,
        r#"data: {"id":"c1","created":1,"model":"gpt-4","choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
        "data: [DONE]",
    ];
    let mut chunks = Vec::new();
    for line in lines {
        chunks.extend(decoder.decode_line(line).unwrap());
    }

    let response = collect_chunks(&chunks);
    assert_eq!(response.choices[0].finish_reason, Some(FinishReason::ToolCalls));
    let calls = response.choices[0].message.tool_calls.as_ref().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function.name, "get_weather");
    assert_eq!(calls[0].function.arguments, r#"{"city":"Paris"}"#);
}

#[test]
fn test_adapter_set_rejects_unknown_compatibility() {
    let adapters = AdapterSet::default();
    assert!(adapters.get(Compatibility::Openai).is_ok());
    assert!(adapters.get(Compatibility::Anthropic).is_ok());
    assert!(adapters.get(Compatibility::Unknown).is_err());
}

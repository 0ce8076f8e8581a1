//! Tool definitions and tool-call types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool kind, currently always `function`
    #[serde(rename = "type")]
    pub kind: String,
    /// Function definition
    pub function: FunctionDef,
}

impl Tool {
    /// Create a function tool
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: Some(description.into()),
                parameters,
            },
        }
    }
}

/// Function signature exposed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the arguments
    pub parameters: serde_json::Value,
}

/// A complete tool call emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, echoed back in tool results
    pub id: String,
    /// Call kind, currently always `function`
    #[serde(rename = "type")]
    pub kind: String,
    /// Invoked function
    pub function: FunctionCall,
}

/// Function invocation carried by a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// Partial tool-call fragment arriving on a stream
///
/// Fragments are keyed by `index`; `name` and `arguments` carry suffixes to
/// append to the accumulated call at that index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Accumulator index; absent implies index 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Call identifier, present on the first fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Call kind
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Partial function fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCallDelta>,
}

/// Partial function fields of a streamed tool call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallDelta {
    /// Name suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Arguments suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Accumulates streamed tool-call fragments into complete calls
///
/// Fragments with no index land at index 0.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    partial: HashMap<u32, PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into the accumulated state
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let index = delta.index.unwrap_or(0);
        let entry = self.partial.entry(index).or_default();
        if let Some(id) = &delta.id {
            entry.id.push_str(id);
        }
        if let Some(function) = &delta.function {
            if let Some(name) = &function.name {
                entry.name.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                entry.arguments.push_str(arguments);
            }
        }
    }

    /// True if no fragments have been accumulated
    pub fn is_empty(&self) -> bool {
        self.partial.is_empty()
    }

    /// Drain the accumulated fragments into complete calls, ordered by index
    pub fn finish(&mut self) -> Vec<ToolCall> {
        let mut indexed: Vec<(u32, PartialToolCall)> = self.partial.drain().collect();
        indexed.sort_by_key(|(index, _)| *index);
        indexed
            .into_iter()
            .map(|(_, partial)| ToolCall {
                id: partial.id,
                kind: "function".to_string(),
                function: FunctionCall { name: partial.name, arguments: partial.arguments },
            })
            .collect()
    }
}

/// Tool selection directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// `auto`, `none`, or `required`
    Mode(String),
    /// Force a specific function
    Function {
        /// Always `function`
        #[serde(rename = "type")]
        kind: String,
        /// Named function
        function: ToolChoiceFunction,
    },
}

/// Function name carried by a forced tool choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    /// Function name
    pub name: String,
}

/// Response format hint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// Requested format
    #[serde(rename = "type")]
    pub kind: ResponseFormatKind,
}

/// Supported response formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatKind {
    /// Free text
    Text,
    /// Valid JSON object
    JsonObject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_concatenates_suffixes() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&ToolCallDelta {
            index: Some(0),
            id: Some("call_1".to_string()),
            kind: Some("function".to_string()),
            function: Some(FunctionCallDelta {
                name: Some("get_wea".to_string()),
                arguments: Some("{\"city\":".to_string()),
            }),
        });
        acc.push(&ToolCallDelta {
            index: Some(0),
            id: None,
            kind: None,
            function: Some(FunctionCallDelta {
                name: Some("ther".to_string()),
                arguments: Some("\"Paris\"}".to_string()),
            }),
        });

        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, "{\"city\":\"Paris\"}");
    }

    #[test]
    fn test_accumulator_missing_index_implies_zero() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&ToolCallDelta {
            index: None,
            id: Some("call_a".to_string()),
            kind: None,
            function: Some(FunctionCallDelta { name: Some("f".to_string()), arguments: None }),
        });
        acc.push(&ToolCallDelta {
            index: Some(0),
            id: None,
            kind: None,
            function: Some(FunctionCallDelta { name: None, arguments: Some("{}".to_string()) }),
        });

        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "f");
        assert_eq!(calls[0].function.arguments, "{}");
    }

    #[test]
    fn test_accumulator_orders_by_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&ToolCallDelta {
            index: Some(1),
            id: Some("second".to_string()),
            kind: None,
            function: None,
        });
        acc.push(&ToolCallDelta {
            index: Some(0),
            id: Some("first".to_string()),
            kind: None,
            function: None,
        });

        let calls = acc.finish();
        assert_eq!(calls[0].id, "first");
        assert_eq!(calls[1].id, "second");
    }
}

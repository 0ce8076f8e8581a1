//! Message roles and content types for the canonical chat schema

use serde::{Deserialize, Serialize};

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions
    System,
    /// End-user input
    User,
    /// Model output
    Assistant,
    /// Tool result fed back to the model
    Tool,
}

impl MessageRole {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// Message content, either plain text or a list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content
    Text(String),
    /// Multi-part content (text and images)
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of the content, ignoring non-text parts
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// One part of a multi-part message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text fragment
    Text {
        /// The text
        text: String,
    },
    /// Image reference, either a remote URL or a data URL
    ImageUrl {
        /// Image location
        image_url: ImageUrl,
    },
}

/// Image URL wrapper matching the OpenAI wire shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Remote URL or `data:<media_type>;base64,<payload>` data URL
    pub url: String,
    /// Requested detail level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ImageUrl {
    /// Split a data URL into `(media_type, base64 payload)`
    ///
    /// Returns `None` for remote URLs or malformed data URLs.
    pub fn as_data_url(&self) -> Option<(String, String)> {
        let rest = self.url.strip_prefix("data:")?;
        let (media_type, payload) = rest.split_once(";base64,")?;
        if media_type.is_empty() || payload.is_empty() {
            return None;
        }
        Some((media_type.to_string(), payload.to_string()))
    }
}

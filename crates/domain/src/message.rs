//! The conversation log's unit of record, and everything that hangs off it:
//! content parts, tool calls, and the compaction/prune metadata that lets
//! the history stay append-only while the *view* of it changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content: a bare string, or an ordered list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    File {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    UiResource {
        uri: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }
}

impl MessageContent {
    /// First text part (or the whole string, for the `Text` variant).
    pub fn first_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(t) => Some(t.as_str()),
            MessageContent::Parts(parts) => parts.iter().find_map(ContentPart::as_text),
        }
    }

    /// All text parts joined with `\n`. Non-text parts are skipped.
    pub fn extract_all_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Normalize to a `Vec<ContentPart>`, wrapping bare text as a single part.
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            MessageContent::Text(t) => vec![ContentPart::Text { text: t }],
            MessageContent::Parts(p) => p,
        }
    }

    pub fn as_parts(&self) -> Vec<ContentPart> {
        match self {
            MessageContent::Text(t) => vec![ContentPart::Text { text: t.clone() }],
            MessageContent::Parts(p) => p.clone(),
        }
    }
}

/// A tool call recorded on an assistant message. `arguments` is the raw
/// JSON-string the model produced, not a parsed `Value` — callers that need
/// structure parse it themselves, matching what gets replayed to providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
    /// Opaque provider-specific data (signed reasoning tokens, etc).
    /// Persisted only for providers on the replay allowlist (see `StreamProcessor`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<serde_json::Value>,
}

/// Tool definition exposed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The sanitized shape of a tool result, as stored in history and streamed
/// to subscribers. Produced by `StreamProcessor` from a tool's raw output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedToolResult {
    pub content: Vec<ContentPart>,
    pub meta: ToolResultMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultMeta {
    pub tool_name: String,
    pub tool_call_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_approval: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<String>,
}

/// Compaction metadata carried only on summary assistant messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionMeta {
    pub is_summary: bool,
    pub summarized_at: i64,
    /// First compaction: count of messages summarized.
    /// Recompaction: absolute insert-index of the summary (see `ReactiveOverflowStrategy`).
    pub original_message_count: usize,
    pub original_first_timestamp: Option<i64>,
    pub original_last_timestamp: Option<i64>,
    #[serde(default)]
    pub is_recompaction: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: Option<i64>,

    /// Assistant-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,

    /// Tool-role only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_metadata: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<crate::usage::TokenUsage>,

    /// Assistant-only; present iff this message is a compaction summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compaction: Option<CompactionMeta>,

    /// Prune marker. Monotonically added, never removed. Content is not
    /// rewritten; placeholder substitution happens only at format time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compacted_at: Option<i64>,
}

impl Message {
    fn base(role: Role, content: MessageContent, timestamp: Option<i64>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            timestamp,
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            reasoning: None,
            reasoning_metadata: None,
            token_usage: None,
            compaction: None,
            compacted_at: None,
        }
    }

    pub fn system(text: impl Into<String>, timestamp: Option<i64>) -> Self {
        Self::base(Role::System, MessageContent::Text(text.into()), timestamp)
    }

    pub fn user(content: MessageContent, timestamp: Option<i64>) -> Self {
        Self::base(Role::User, content, timestamp)
    }

    pub fn assistant_text(text: impl Into<String>, timestamp: Option<i64>) -> Self {
        Self::base(Role::Assistant, MessageContent::Text(text.into()), timestamp)
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: Vec<ContentPart>,
        timestamp: Option<i64>,
    ) -> Self {
        let mut m = Self::base(Role::Tool, MessageContent::Parts(content), timestamp);
        m.tool_call_id = Some(tool_call_id.into());
        m.tool_name = Some(tool_name.into());
        m
    }

    pub fn is_summary(&self) -> bool {
        self.compaction.as_ref().is_some_and(|c| c.is_summary)
    }
}

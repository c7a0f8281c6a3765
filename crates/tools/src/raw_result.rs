//! The raw shape a `Tool::execute` may return, before `ToolManager`
//! translates it into a sanitized, provider-consumable tool result.

use serde::{Deserialize, Serialize};
use turnloop_domain::ContentPart;

/// What a tool hands back. The three shapes mirror the Tool contract:
/// a bare string, a structured error, or mixed content parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawToolResult {
    Text(String),
    Error(RawToolError),
    Content { content: Vec<ContentPart> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawToolError {
    pub error: String,
    #[serde(default)]
    pub denied: bool,
    #[serde(default)]
    pub timeout: bool,
}

impl RawToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        RawToolResult::Text(text.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        RawToolResult::Error(RawToolError {
            error: message.into(),
            denied: false,
            timeout: false,
        })
    }

    pub fn denied(message: impl Into<String>) -> Self {
        RawToolResult::Error(RawToolError {
            error: message.into(),
            denied: true,
            timeout: false,
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RawToolResult::Error(_))
    }
}

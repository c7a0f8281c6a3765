//! The typed event taxonomy published on `EventBus`. Session-scoped events
//! carry `session_id` when re-published at a higher level than this core.

use serde::Serialize;

use turnloop_domain::{SanitizedToolResult, TokenUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkType {
    Text,
    Reasoning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompactionReason {
    Overflow,
    Manual,
}

/// One event in the canonical stream. Variant names mirror the
/// `category:action` taxonomy (`llm:chunk`, `context:pruned`, ...).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    #[serde(rename = "llm:thinking")]
    LlmThinking,

    #[serde(rename = "llm:chunk")]
    LlmChunk {
        chunk_type: ChunkType,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_complete: Option<bool>,
    },

    #[serde(rename = "llm:response")]
    LlmResponse {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
        provider: String,
        model: String,
        token_usage: TokenUsage,
        finish_reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        estimated_input_tokens: Option<u64>,
    },

    #[serde(rename = "llm:tool-call")]
    LlmToolCall {
        tool_name: String,
        args: serde_json::Value,
        call_id: String,
    },

    #[serde(rename = "llm:tool-result")]
    LlmToolResult {
        tool_name: String,
        call_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        sanitized: Option<SanitizedToolResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        require_approval: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        approval_status: Option<String>,
    },

    #[serde(rename = "llm:error")]
    LlmError {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        recoverable: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
    },

    #[serde(rename = "tool:running")]
    ToolRunning { tool_name: String, tool_call_id: String },

    #[serde(rename = "context:compacting")]
    ContextCompacting { estimated_tokens: u64 },

    #[serde(rename = "context:compacted")]
    ContextCompacted {
        original_tokens: u64,
        compacted_tokens: u64,
        original_messages: usize,
        compacted_messages: usize,
        strategy: String,
        reason: CompactionReason,
    },

    #[serde(rename = "context:pruned")]
    ContextPruned { pruned_count: usize, saved_tokens: u64 },

    #[serde(rename = "message:queued")]
    MessageQueued { position: usize, id: String },

    #[serde(rename = "message:dequeued")]
    MessageDequeued {
        count: usize,
        ids: Vec<String>,
        coalesced: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },

    #[serde(rename = "message:removed")]
    MessageRemoved { id: String },

    #[serde(rename = "run:complete")]
    RunComplete {
        finish_reason: String,
        step_count: usize,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "approval:request")]
    ApprovalRequest { payload: serde_json::Value },

    #[serde(rename = "approval:response")]
    ApprovalResponse { payload: serde_json::Value },
}

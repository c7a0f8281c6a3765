//! Dispatches tool calls the model requested, sanitizing raw results into
//! the shape persisted in history and streamed to subscribers.
//!
//! `llm:tool-call` is emitted here, not by `StreamProcessor` — a call can
//! be parsed off the wire well before it's actually picked up for
//! execution, so announcing it happens at dispatch time, immediately
//! before `tool:running`.

use std::collections::HashMap;
use std::sync::Arc;

use turnloop_domain::{ContentPart, Error, SanitizedToolResult, ToolCallRequest, ToolDefinition, ToolResultMeta};
use turnloop_tools::{RawToolResult, Tool, ToolContext};

use crate::event_bus::EventBus;
use crate::events::AgentEvent;

pub struct ToolManager {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute one tool call and sanitize its result. Always returns a
    /// `SanitizedToolResult` — an unknown tool name or a malformed-arguments
    /// parse failure becomes a `success: false` result rather than a
    /// propagated error, so one bad call doesn't abort the whole step.
    pub async fn dispatch(
        &self,
        call: &ToolCallRequest,
        session_id: &str,
        bus: &EventBus,
    ) -> SanitizedToolResult {
        let parsed_args = serde_json::from_str::<serde_json::Value>(&call.arguments);
        let event_args = match &parsed_args {
            Ok(v) => v.clone(),
            Err(_) => serde_json::Value::Null,
        };
        bus.emit(
            session_id,
            AgentEvent::LlmToolCall { tool_name: call.name.clone(), args: event_args, call_id: call.id.clone() },
        );
        bus.emit(
            session_id,
            AgentEvent::ToolRunning { tool_name: call.name.clone(), tool_call_id: call.id.clone() },
        );

        let ctx = ToolContext { session_id: Some(session_id.to_string()), tool_call_id: call.id.clone() };

        let outcome = match self.tools.get(&call.name) {
            None => Err(Error::Validation(format!("unknown tool: {}", call.name))),
            Some(tool) => match parsed_args {
                Ok(args) => tool.execute(args, &ctx).await,
                Err(e) => Err(Error::Validation(format!("invalid tool arguments: {e}"))),
            },
        };

        let sanitized = sanitize(&call.id, &call.name, outcome);

        bus.emit(
            session_id,
            AgentEvent::LlmToolResult {
                tool_name: call.name.clone(),
                call_id: call.id.clone(),
                success: sanitized.meta.success,
                sanitized: Some(sanitized.clone()),
                error: if sanitized.meta.success {
                    None
                } else {
                    sanitized.content.first().and_then(|p| p.as_text()).map(String::from)
                },
                require_approval: sanitized.meta.require_approval,
                approval_status: sanitized.meta.approval_status.clone(),
            },
        );

        sanitized
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize(call_id: &str, tool_name: &str, outcome: Result<RawToolResult, Error>) -> SanitizedToolResult {
    let (content, success, require_approval, approval_status) = match outcome {
        Ok(RawToolResult::Text(text)) => (vec![ContentPart::text(text)], true, None, None),
        Ok(RawToolResult::Content { content }) => (content, true, None, None),
        Ok(RawToolResult::Error(e)) => {
            let approval_status = if e.denied { Some("denied".to_string()) } else { None };
            (vec![ContentPart::text(e.error)], false, Some(e.denied), approval_status)
        }
        Err(e) => (vec![ContentPart::text(e.to_string())], false, None, None),
    };

    SanitizedToolResult {
        content,
        meta: ToolResultMeta {
            tool_name: tool_name.to_string(),
            tool_call_id: call_id.to_string(),
            success,
            require_approval,
            approval_status,
        },
    }
}

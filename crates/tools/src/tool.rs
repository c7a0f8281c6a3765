use turnloop_domain::Error;

use crate::raw_result::RawToolResult;

/// Per-call context a tool may use. Carries nothing the turn-execution core
/// itself depends on; hosts extend the shape they pass in by wrapping it.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: Option<String>,
    pub tool_call_id: String,
}

/// A tool the model may invoke. `execute` returns the raw, pre-sanitization
/// result; `ToolManager` (in `turnloop-core`) sanitizes it before it's
/// persisted and streamed.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> serde_json::Value;

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<RawToolResult, Error>;
}

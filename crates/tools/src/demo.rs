//! Deterministic tools used to exercise `turnloop-core`'s tool dispatch in
//! tests, without shelling out to anything host-specific.

use serde::Deserialize;
use serde_json::json;
use turnloop_domain::Error;

use crate::raw_result::RawToolResult;
use crate::tool::{Tool, ToolContext};

/// Echoes its input back, optionally uppercased. Useful for asserting
/// argument plumbing and tool-call/tool-result pairing in tests.
pub struct EchoTool;

#[derive(Debug, Deserialize)]
struct EchoArgs {
    text: String,
    #[serde(default)]
    uppercase: bool,
}

#[async_trait::async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back, optionally uppercased."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "uppercase": { "type": "boolean" }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, args: serde_json::Value, _ctx: &ToolContext) -> Result<RawToolResult, Error> {
        let args: EchoArgs = serde_json::from_value(args)
            .map_err(|e| Error::Validation(format!("invalid echo arguments: {e}")))?;
        let text = if args.uppercase {
            args.text.to_uppercase()
        } else {
            args.text
        };
        Ok(RawToolResult::text(text))
    }
}

/// A tool that always fails, deliberately, for exercising the
/// `{error, denied?, timeout?}` tool-error path.
pub struct FailingTool {
    pub denied: bool,
    pub timeout: bool,
}

#[async_trait::async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "always_fail"
    }

    fn description(&self) -> &str {
        "A tool that always returns an error, for testing the failure path."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> Result<RawToolResult, Error> {
        Ok(RawToolResult::Error(crate::raw_result::RawToolError {
            error: "deliberate failure".into(),
            denied: self.denied,
            timeout: self.timeout,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_passes_through_text() {
        let tool = EchoTool;
        let result = tool
            .execute(json!({"text": "hi"}), &ToolContext::default())
            .await
            .unwrap();
        match result {
            RawToolResult::Text(t) => assert_eq!(t, "hi"),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn echo_uppercases_when_requested() {
        let tool = EchoTool;
        let result = tool
            .execute(json!({"text": "hi", "uppercase": true}), &ToolContext::default())
            .await
            .unwrap();
        match result {
            RawToolResult::Text(t) => assert_eq!(t, "HI"),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn echo_rejects_missing_required_field() {
        let tool = EchoTool;
        let result = tool.execute(json!({}), &ToolContext::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failing_tool_reports_denied() {
        let tool = FailingTool { denied: true, timeout: false };
        let result = tool
            .execute(json!({}), &ToolContext::default())
            .await
            .unwrap();
        assert!(result.is_error());
    }
}

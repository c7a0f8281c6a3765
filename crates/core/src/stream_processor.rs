//! Consumes one provider event stream exactly once, folding it into
//! persisted history and the canonical `AgentEvent` stream.
//!
//! Ordering guarantees: `llm:response` is only ever emitted once the
//! provider's `finish` event has been observed. A parsed tool call is
//! persisted here but not announced — `llm:tool-call` is `ToolManager`'s
//! job, emitted when execution actually begins, not when the call is
//! parsed off the wire.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures_util::StreamExt;

use turnloop_domain::{Error, Message, MessageId, SanitizedToolResult, TokenUsage, ToolCallRequest, ToolResultMeta};
use turnloop_providers::stream::{BoxStream, FinishReason, ProviderEvent};

use crate::cancel::CancelToken;
use crate::context_manager::InMemoryContextManager;
use crate::event_bus::EventBus;
use crate::events::{AgentEvent, ChunkType};

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub finish_reason: FinishReason,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: TokenUsage,
    pub aborted: bool,
}

pub fn finish_reason_str(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "stop",
        FinishReason::ToolCalls => "tool-calls",
        FinishReason::Length => "length",
        FinishReason::ContentFilter => "content-filter",
        FinishReason::Error => "error",
        FinishReason::Other => "other",
        FinishReason::Unknown => "unknown",
        FinishReason::Cancelled => "cancelled",
        FinishReason::MaxSteps => "max-steps",
    }
}

/// One-shot by construction: a fresh `StreamProcessor` is built per step,
/// and `process` refuses a second call on the same instance.
pub struct StreamProcessor {
    consumed: AtomicBool,
}

impl StreamProcessor {
    pub fn new() -> Self {
        Self { consumed: AtomicBool::new(false) }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn process(
        &self,
        mut stream: BoxStream<'static, ProviderEvent>,
        context: &InMemoryContextManager,
        assistant_id: MessageId,
        provider_id: &str,
        model: &str,
        bus: &EventBus,
        session_id: &str,
        cancel: &CancelToken,
    ) -> Result<StepOutcome, Error> {
        if self.consumed.swap(true, Ordering::AcqRel) {
            return Err(Error::Fatal("StreamProcessor::process called more than once".into()));
        }

        let mut tool_calls: Vec<ToolCallRequest> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut finish_reason = FinishReason::Unknown;
        let mut reasoning = String::new();

        while let Some(event) = stream.next().await {
            if cancel.is_cancelled() {
                return Ok(StepOutcome { finish_reason: FinishReason::Cancelled, tool_calls, usage, aborted: true });
            }

            match event {
                ProviderEvent::TextDelta { text } => {
                    context.append_assistant_text(assistant_id, &text);
                    bus.emit(
                        session_id,
                        AgentEvent::LlmChunk { chunk_type: ChunkType::Text, content: text, is_complete: None },
                    );
                }
                ProviderEvent::ReasoningDelta { text } => {
                    reasoning.push_str(&text);
                    let snapshot = reasoning.clone();
                    context.update_assistant_message(assistant_id, |m| m.reasoning = Some(snapshot));
                    bus.emit(
                        session_id,
                        AgentEvent::LlmChunk { chunk_type: ChunkType::Reasoning, content: text, is_complete: None },
                    );
                }
                ProviderEvent::ToolCall { id, name, arguments_json } => {
                    let call = ToolCallRequest { id, name, arguments: arguments_json, provider_metadata: None };
                    context.add_tool_call(assistant_id, call.clone());
                    tool_calls.push(call);
                }
                ProviderEvent::ToolResult { tool_call_id, content } => {
                    let tool_name = tool_calls
                        .iter()
                        .rev()
                        .find(|c| c.id == tool_call_id)
                        .map(|c| c.name.clone())
                        .unwrap_or_default();
                    let sanitized = SanitizedToolResult {
                        content: content.clone(),
                        meta: ToolResultMeta {
                            tool_name: tool_name.clone(),
                            tool_call_id: tool_call_id.clone(),
                            success: true,
                            require_approval: None,
                            approval_status: None,
                        },
                    };
                    context.add_message(Message::tool_result(
                        tool_call_id.clone(),
                        tool_name.clone(),
                        content,
                        Some(Utc::now().timestamp_millis()),
                    ));
                    bus.emit(
                        session_id,
                        AgentEvent::LlmToolResult {
                            tool_name,
                            call_id: tool_call_id,
                            success: true,
                            sanitized: Some(sanitized),
                            error: None,
                            require_approval: None,
                            approval_status: None,
                        },
                    );
                }
                ProviderEvent::Error { error } => {
                    bus.emit(
                        session_id,
                        AgentEvent::LlmError {
                            error: error.to_string(),
                            context: None,
                            recoverable: Some(error.is_rate_limit() || error.is_timeout()),
                            tool_call_id: None,
                        },
                    );
                    return Err(error);
                }
                ProviderEvent::Abort => {
                    return Ok(StepOutcome {
                        finish_reason: FinishReason::Cancelled,
                        tool_calls,
                        usage,
                        aborted: true,
                    });
                }
                ProviderEvent::Finish { finish_reason: fr, usage: raw } => {
                    finish_reason = fr;
                    if let Some(raw) = raw {
                        usage = raw.into_token_usage();
                    }
                }
            }
        }

        context.update_assistant_message(assistant_id, |m| m.token_usage = Some(usage));

        let content = context
            .raw_history()
            .into_iter()
            .find(|m| m.id == assistant_id)
            .map(|m| m.content.extract_all_text())
            .unwrap_or_default();

        bus.emit(
            session_id,
            AgentEvent::LlmResponse {
                content,
                reasoning: if reasoning.is_empty() { None } else { Some(reasoning) },
                provider: provider_id.to_string(),
                model: model.to_string(),
                token_usage: usage,
                finish_reason: finish_reason_str(finish_reason).to_string(),
                estimated_input_tokens: None,
            },
        );

        Ok(StepOutcome { finish_reason, tool_calls, usage, aborted: false })
    }
}

impl Default for StreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnloop_domain::MessageContent;
    use turnloop_providers::mock::{MockProvider, ScriptedStep};
    use turnloop_providers::traits::{ChatRequest, LlmProvider};

    async fn run_step(provider: &MockProvider) -> (StepOutcome, InMemoryContextManager) {
        let context = InMemoryContextManager::new();
        let assistant_id = context.add_assistant_message("");
        let bus = EventBus::new();
        let cancel = CancelToken::new();
        let stream = provider.chat_stream(&ChatRequest::default()).await.unwrap();
        let processor = StreamProcessor::new();
        let outcome = processor
            .process(stream, &context, assistant_id, "mock", "mock-model", &bus, "s1", &cancel)
            .await
            .unwrap();
        (outcome, context)
    }

    #[tokio::test]
    async fn text_deltas_accumulate_into_assistant_message() {
        let provider = MockProvider::new("mock", vec![ScriptedStep::text("hello world", FinishReason::Stop)]);
        let (outcome, context) = run_step(&provider).await;
        assert_eq!(outcome.finish_reason, FinishReason::Stop);
        let history = context.raw_history();
        assert_eq!(history[0].content.extract_all_text(), "hello world");
    }

    #[tokio::test]
    async fn tool_call_is_recorded_before_finish() {
        let provider = MockProvider::new("mock", vec![ScriptedStep::tool_call("c1", "search", r#"{"q":"x"}"#)]);
        let (outcome, context) = run_step(&provider).await;
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.finish_reason, FinishReason::ToolCalls);
        let history = context.raw_history();
        assert_eq!(history[0].tool_calls.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn process_called_twice_on_same_instance_errors() {
        let context = InMemoryContextManager::new();
        let assistant_id = context.add_assistant_message("");
        let bus = EventBus::new();
        let cancel = CancelToken::new();
        let provider = MockProvider::new("mock", vec![ScriptedStep::text("hi", FinishReason::Stop)]);
        let processor = StreamProcessor::new();

        let stream1 = provider.chat_stream(&ChatRequest::default()).await.unwrap();
        processor
            .process(stream1, &context, assistant_id, "mock", "m", &bus, "s1", &cancel)
            .await
            .unwrap();

        let stream2 = provider.chat_stream(&ChatRequest::default()).await.unwrap();
        let second = processor
            .process(stream2, &context, assistant_id, "mock", "m", &bus, "s1", &cancel)
            .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn cancellation_mid_stream_reports_aborted() {
        let context = InMemoryContextManager::new();
        context.add_user_message(MessageContent::Text("hi".into()));
        let assistant_id = context.add_assistant_message("");
        let bus = EventBus::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let provider = MockProvider::new("mock", vec![ScriptedStep::text("hi", FinishReason::Stop)]);
        let stream = provider.chat_stream(&ChatRequest::default()).await.unwrap();
        let processor = StreamProcessor::new();
        let outcome = processor
            .process(stream, &context, assistant_id, "mock", "m", &bus, "s1", &cancel)
            .await
            .unwrap();
        assert!(outcome.aborted);
    }
}

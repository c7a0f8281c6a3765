//! Drives one agent turn to completion: drain the queue, check for
//! overflow, call the model, dispatch any tool calls, prune, repeat until a
//! terminal finish reason or the step cap is hit.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;

use turnloop_domain::config::{CompactionConfig, PruningConfig, TurnExecutorConfig};
use turnloop_domain::{Error, Message, MessageContent, ModelLimits, TokenUsage};
use turnloop_providers::stream::FinishReason;
use turnloop_providers::traits::ChatRequest;
use turnloop_providers::LlmProvider;

use crate::cancel::CancelToken;
use crate::context_manager::InMemoryContextManager;
use crate::event_bus::EventBus;
use crate::events::{AgentEvent, CompactionReason};
use crate::message_queue::MessageQueue;
use crate::overflow::{compact, is_overflow};
use crate::pruning::prune_old_tool_outputs;
use crate::stream_processor::{finish_reason_str, StreamProcessor};
use crate::tool_manager::ToolManager;

/// Whether a given `provider:base_url` combination accepts tool
/// definitions, cached for the process lifetime so the probe call only
/// happens once per distinct non-native endpoint (§4.1).
static TOOL_SUPPORT_CACHE: OnceLock<RwLock<HashMap<String, bool>>> = OnceLock::new();

fn tool_support_cache() -> &'static RwLock<HashMap<String, bool>> {
    TOOL_SUPPORT_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub finish_reason: FinishReason,
    pub step_count: usize,
    pub usage: TokenUsage,
    pub aborted: bool,
}

/// Clears pending queued messages on scope exit — normal return, early
/// return on error, or unwind — per the "discarded on scope exit" rule.
/// `MessageQueue::clear` is a no-op (emits nothing) on an empty queue, so
/// this is safe to run even when the last step's `dequeue_all` already
/// drained everything.
struct QueueClearGuard<'a> {
    queue: &'a MessageQueue,
    bus: &'a EventBus,
    session_id: &'a str,
}

impl Drop for QueueClearGuard<'_> {
    fn drop(&mut self) {
        self.queue.clear(self.bus, self.session_id);
    }
}

pub struct TurnExecutor {
    pub context: InMemoryContextManager,
    pub queue: MessageQueue,
    pub bus: EventBus,
    pub tool_manager: ToolManager,
    pub cancel: CancelToken,
    pub session_id: String,
    pub config: TurnExecutorConfig,
    pub compaction_config: CompactionConfig,
    pub pruning_config: PruningConfig,
    pub limits: ModelLimits,
}

impl TurnExecutor {
    pub fn new(session_id: impl Into<String>, limits: ModelLimits) -> Self {
        Self {
            context: InMemoryContextManager::new(),
            queue: MessageQueue::new(),
            bus: EventBus::new(),
            tool_manager: ToolManager::new(),
            cancel: CancelToken::new(),
            session_id: session_id.into(),
            config: TurnExecutorConfig::default(),
            compaction_config: CompactionConfig::default(),
            pruning_config: PruningConfig::default(),
            limits,
        }
    }

    /// Idempotent: calling this more than once, or after the turn has
    /// already finished, is a no-op.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Run the full loop for one turn against `provider`. `seed_message`,
    /// if given, is appended as a user message before the first step.
    pub async fn execute(
        &self,
        seed_message: Option<MessageContent>,
        provider: &dyn LlmProvider,
    ) -> Result<TurnOutcome, Error> {
        let _span = tracing::info_span!("turn_execute", session_id = %self.session_id).entered();
        let start = Instant::now();
        let _queue_guard = QueueClearGuard { queue: &self.queue, bus: &self.bus, session_id: &self.session_id };

        if let Some(content) = seed_message {
            self.context.add_user_message(content);
        }

        self.bus.emit(&self.session_id, AgentEvent::LlmThinking);

        let mut step_count = 0usize;
        let mut last_usage = TokenUsage::default();
        let mut final_finish = FinishReason::Unknown;
        let mut aborted = false;
        let mut last_assistant_id = None;

        loop {
            if self.cancel.is_cancelled() {
                final_finish = FinishReason::Cancelled;
                aborted = true;
                break;
            }
            if step_count >= self.config.max_steps {
                tracing::warn!(steps = step_count, "turn hit max_steps without a terminal finish reason");
                final_finish = FinishReason::MaxSteps;
                break;
            }

            if let Some(coalesced) = self.queue.dequeue_all(&self.bus, &self.session_id) {
                self.context.add_message(Message::user(
                    MessageContent::Parts(coalesced.combined_content),
                    Some(Utc::now().timestamp_millis()),
                ));
            }

            if step_count > 0 && is_overflow(&last_usage, &self.limits) {
                self.run_compaction(provider, &last_usage).await;
            }

            let messages = self.context.formatted_messages_with_placeholder(&self.pruning_config.placeholder);
            let tools = self.resolve_tools(provider).await;

            let request = ChatRequest {
                messages,
                tools,
                temperature: self.config.temperature,
                max_tokens: self.config.max_output_tokens,
                model: None,
            };

            let stream = match provider.chat_stream(&request).await {
                Ok(stream) => stream,
                Err(error) => {
                    self.emit_failure(&error);
                    return Err(error);
                }
            };

            let assistant_id = self.context.add_assistant_message("");
            last_assistant_id = Some(assistant_id);
            let processor = StreamProcessor::new();
            let outcome = match processor
                .process(
                    stream,
                    &self.context,
                    assistant_id,
                    provider.provider_id(),
                    provider.provider_id(),
                    &self.bus,
                    &self.session_id,
                    &self.cancel,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.emit_failure(&error);
                    return Err(error);
                }
            };

            step_count += 1;
            last_usage = outcome.usage;
            final_finish = outcome.finish_reason;

            if outcome.aborted {
                aborted = true;
                break;
            }

            if outcome.finish_reason == FinishReason::ToolCalls && !outcome.tool_calls.is_empty() {
                for call in &outcome.tool_calls {
                    let sanitized = self.tool_manager.dispatch(call, &self.session_id, &self.bus).await;
                    self.context.add_message(Message::tool_result(
                        call.id.clone(),
                        call.name.clone(),
                        sanitized.content,
                        Some(Utc::now().timestamp_millis()),
                    ));
                }
                if let Some(prune) = prune_old_tool_outputs(&self.context, &self.pruning_config) {
                    self.bus.emit(
                        &self.session_id,
                        AgentEvent::ContextPruned { pruned_count: prune.pruned_count, saved_tokens: prune.saved_tokens },
                    );
                }
                continue;
            }

            // A non-tool-calls finish isn't necessarily the end of the turn:
            // a user message may have arrived while the model was still
            // streaming. Drain once more before terminating.
            if let Some(coalesced) = self.queue.dequeue_all(&self.bus, &self.session_id) {
                self.context.add_message(Message::user(
                    MessageContent::Parts(coalesced.combined_content),
                    Some(Utc::now().timestamp_millis()),
                ));
                continue;
            }

            break;
        }

        let text = last_assistant_id
            .and_then(|id| self.context.raw_history().into_iter().find(|m| m.id == id))
            .map(|m| m.content.extract_all_text())
            .unwrap_or_default();

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            steps = step_count,
            finish_reason = finish_reason_str(final_finish),
            duration_ms,
            "turn complete"
        );
        self.bus.emit(
            &self.session_id,
            AgentEvent::RunComplete {
                finish_reason: finish_reason_str(final_finish).to_string(),
                step_count,
                duration_ms,
                error: None,
            },
        );

        Ok(TurnOutcome { text, finish_reason: final_finish, step_count, usage: last_usage, aborted })
    }

    async fn run_compaction(&self, provider: &dyn LlmProvider, last_usage: &TokenUsage) {
        self.bus.emit(
            &self.session_id,
            AgentEvent::ContextCompacting { estimated_tokens: last_usage.total() },
        );
        let before = self.context.raw_history();
        let original_messages = before.len();
        if let Some(summary) = compact(&before, &self.compaction_config, provider).await {
            self.context.append_summary(summary);
            self.bus.emit(
                &self.session_id,
                AgentEvent::ContextCompacted {
                    original_tokens: last_usage.total(),
                    compacted_tokens: 0,
                    original_messages,
                    compacted_messages: self.context.len(),
                    strategy: "reactive-overflow".to_string(),
                    reason: CompactionReason::Overflow,
                },
            );
        }
    }

    /// Native providers always get the full tool list; a provider behind a
    /// custom `base_url` is probed once and the result cached for the
    /// process lifetime, keyed by `provider_id:base_url`.
    async fn resolve_tools(&self, provider: &dyn LlmProvider) -> Vec<turnloop_domain::ToolDefinition> {
        let definitions = self.tool_manager.definitions();
        if definitions.is_empty() || provider.is_native() {
            return definitions;
        }

        let key = format!("{}:{}", provider.provider_id(), self.config.base_url.as_deref().unwrap_or(""));
        if let Some(&supported) = tool_support_cache().read().get(&key) {
            return if supported { definitions } else { Vec::new() };
        }

        let probe = ChatRequest {
            messages: vec![Message::user(MessageContent::Text("ping".into()), None)],
            tools: definitions.clone(),
            temperature: None,
            max_tokens: Some(1),
            model: None,
        };
        let supported = provider.chat(&probe).await.is_ok();
        tool_support_cache().write().insert(key, supported);

        if supported { definitions } else { Vec::new() }
    }

    fn emit_failure(&self, error: &Error) {
        let code = if error.is_rate_limit() {
            "RATE_LIMIT_EXCEEDED"
        } else if error.is_timeout() {
            "TIMEOUT"
        } else {
            "THIRD_PARTY"
        };
        self.bus.emit(
            &self.session_id,
            AgentEvent::LlmError {
                error: format!("{code}: {error}"),
                context: None,
                recoverable: Some(error.is_rate_limit() || error.is_timeout()),
                tool_call_id: None,
            },
        );
    }
}

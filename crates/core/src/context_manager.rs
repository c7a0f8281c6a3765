//! The append-only conversation log. History is never rewritten in place —
//! compaction appends a summary message, pruning sets a `compacted_at`
//! marker — so every read-side view is a pure function of the raw log.

use chrono::Utc;
use parking_lot::RwLock;

use turnloop_domain::{
    CompactionMeta, ContentPart, Message, MessageContent, Role, SanitizedToolResult, ToolCallRequest,
};

use crate::overflow::filter_compacted;
use crate::pruning::PRUNE_PLACEHOLDER;

/// In-memory history store. One per session; never shared across sessions
/// (`TurnExecutor` owns it through an `Arc`, same as `EventBus`/`MessageQueue`).
pub struct InMemoryContextManager {
    history: RwLock<Vec<Message>>,
}

impl InMemoryContextManager {
    pub fn new() -> Self {
        Self { history: RwLock::new(Vec::new()) }
    }

    pub fn with_history(history: Vec<Message>) -> Self {
        Self { history: RwLock::new(history) }
    }

    // --- append operations -------------------------------------------------

    pub fn add_message(&self, message: Message) {
        self.history.write().push(message);
    }

    pub fn add_user_message(&self, content: MessageContent) {
        self.add_message(Message::user(content, Some(Utc::now().timestamp_millis())));
    }

    pub fn add_assistant_message(&self, text: impl Into<String>) -> turnloop_domain::MessageId {
        let message = Message::assistant_text(text, Some(Utc::now().timestamp_millis()));
        let id = message.id;
        self.add_message(message);
        id
    }

    /// Append `delta` to the most recent assistant message's text, or start
    /// a new one if the log is empty or the last message isn't an
    /// in-progress assistant turn. Used by `StreamProcessor` to build up
    /// text from streamed deltas without allocating a message per chunk.
    pub fn append_assistant_text(&self, id: turnloop_domain::MessageId, delta: &str) {
        let mut history = self.history.write();
        if let Some(message) = history.iter_mut().find(|m| m.id == id) {
            match &mut message.content {
                MessageContent::Text(text) => text.push_str(delta),
                MessageContent::Parts(parts) => {
                    if let Some(ContentPart::Text { text }) = parts.last_mut() {
                        text.push_str(delta);
                    } else {
                        parts.push(ContentPart::text(delta));
                    }
                }
            }
        }
    }

    pub fn update_assistant_message<F>(&self, id: turnloop_domain::MessageId, f: F)
    where
        F: FnOnce(&mut Message),
    {
        let mut history = self.history.write();
        if let Some(message) = history.iter_mut().find(|m| m.id == id) {
            f(message);
        }
    }

    pub fn add_tool_call(&self, assistant_id: turnloop_domain::MessageId, call: ToolCallRequest) {
        let mut history = self.history.write();
        if let Some(message) = history.iter_mut().find(|m| m.id == assistant_id) {
            message.tool_calls.get_or_insert_with(Vec::new).push(call);
        }
    }

    pub fn add_tool_result(&self, result: SanitizedToolResult) {
        let message = Message::tool_result(
            result.meta.tool_call_id,
            result.meta.tool_name,
            result.content,
            Some(Utc::now().timestamp_millis()),
        );
        self.add_message(message);
    }

    // --- mark operations -----------------------------------------------

    /// Replace `history` wholesale with `new_history` plus a trailing
    /// summary message — the only mutation that touches more than the
    /// latest entry. Called once per successful compaction.
    pub fn append_summary(&self, summary: Message) {
        debug_assert!(summary.is_summary());
        self.history.write().push(summary);
    }

    /// Mark messages at `ids` as pruned by setting `compacted_at`. Applying
    /// this twice to the same id is a no-op the second time.
    pub fn mark_messages_as_pruned(&self, ids: &[turnloop_domain::MessageId]) {
        let now = Utc::now().timestamp_millis();
        let mut history = self.history.write();
        for message in history.iter_mut() {
            if ids.contains(&message.id) && message.compacted_at.is_none() {
                message.compacted_at = Some(now);
            }
        }
    }

    // --- read operations -----------------------------------------------

    /// The raw, unfiltered log. Used for persistence and for compaction's
    /// own boundary search, which must see summaries to avoid re-summarizing
    /// them.
    pub fn raw_history(&self) -> Vec<Message> {
        self.history.read().clone()
    }

    pub fn len(&self) -> usize {
        self.history.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.read().is_empty()
    }

    /// The view a model call actually sees: `filter_compacted`, then
    /// placeholder substitution for pruned tool messages. Neither step
    /// mutates the stored log. Uses the default placeholder text; callers
    /// with a configured `PruningConfig` should use
    /// [`Self::formatted_messages_with_placeholder`] instead.
    pub fn formatted_messages(&self) -> Vec<Message> {
        self.formatted_messages_with_placeholder(PRUNE_PLACEHOLDER)
    }

    pub fn formatted_messages_with_placeholder(&self, placeholder: &str) -> Vec<Message> {
        let raw = self.history.read();
        filter_compacted(&raw)
            .into_iter()
            .map(|m| apply_prune_placeholder(m, placeholder))
            .collect()
    }
}

impl Default for InMemoryContextManager {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_prune_placeholder(mut message: Message, placeholder: &str) -> Message {
    if message.compacted_at.is_none() || message.role != Role::Tool {
        return message;
    }
    message.content = MessageContent::Text(placeholder.to_string());
    message
}

//! Types shared between `MessageQueue` and its callers. The coalescing
//! algorithm itself lives in `turnloop-core::message_queue`; this crate only
//! owns the data shapes so other crates can reason about queued messages
//! without depending on the core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::ContentPart;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueuedMessageId(pub Uuid);

impl QueuedMessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueuedMessageId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: QueuedMessageId,
    pub content: Vec<ContentPart>,
    pub queued_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// The result of draining the queue: one or more queued messages combined
/// into a single injectable user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoalescedMessage {
    pub messages: Vec<QueuedMessage>,
    pub combined_content: Vec<ContentPart>,
    pub first_queued_at: i64,
    pub last_queued_at: i64,
}

impl CoalescedMessage {
    pub fn ids(&self) -> Vec<QueuedMessageId> {
        self.messages.iter().map(|m| m.id).collect()
    }

    pub fn count(&self) -> usize {
        self.messages.len()
    }

    pub fn coalesced(&self) -> bool {
        self.messages.len() > 1
    }
}

//! Accepts user messages asynchronously and surfaces them as one coalesced
//! injection per step boundary. Mirrors the teacher's lock-behind-a-`Mutex`
//! shape (`CancelMap`, `SessionLockMap`) but over a `VecDeque`, so
//! `dequeue_all` is a single atomic `std::mem::take`.

use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;

use turnloop_domain::{CoalescedMessage, ContentPart, QueuedMessage, QueuedMessageId};

use crate::event_bus::EventBus;
use crate::events::AgentEvent;

pub struct EnqueueResult {
    pub id: QueuedMessageId,
    pub position: usize,
}

pub struct MessageQueue {
    inner: Mutex<VecDeque<QueuedMessage>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Append a message and emit `message:queued`. `position` is the
    /// message's 0-based index in the queue at the moment it was appended.
    pub fn enqueue(
        &self,
        content: Vec<ContentPart>,
        metadata: Option<serde_json::Value>,
        bus: &EventBus,
        session_id: &str,
    ) -> EnqueueResult {
        let id = QueuedMessageId::new();
        let position = {
            let mut queue = self.inner.lock();
            let position = queue.len();
            queue.push_back(QueuedMessage {
                id,
                content,
                queued_at: Utc::now().timestamp_millis(),
                metadata,
            });
            position
        };
        bus.emit(
            session_id,
            AgentEvent::MessageQueued {
                position,
                id: id.0.to_string(),
            },
        );
        EnqueueResult { id, position }
    }

    /// Atomically drain the whole queue and coalesce it into one message.
    /// Returns `None` (and emits nothing) if the queue was empty.
    pub fn dequeue_all(&self, bus: &EventBus, session_id: &str) -> Option<CoalescedMessage> {
        let drained: Vec<QueuedMessage> = {
            let mut queue = self.inner.lock();
            std::mem::take(&mut *queue).into_iter().collect()
        };
        if drained.is_empty() {
            return None;
        }
        let coalesced = coalesce(drained);
        bus.emit(
            session_id,
            AgentEvent::MessageDequeued {
                count: coalesced.count(),
                ids: coalesced.ids().into_iter().map(|id| id.0.to_string()).collect(),
                coalesced: coalesced.coalesced(),
                content: coalesced.combined_content.first().and_then(|p| p.as_text()).map(String::from),
            },
        );
        Some(coalesced)
    }

    pub fn has_pending(&self) -> bool {
        !self.inner.lock().is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Discard everything, emitting a dequeue event with `coalesced=false`
    /// for observer symmetry with `dequeue_all`.
    pub fn clear(&self, bus: &EventBus, session_id: &str) {
        let drained: Vec<QueuedMessage> = {
            let mut queue = self.inner.lock();
            std::mem::take(&mut *queue).into_iter().collect()
        };
        if drained.is_empty() {
            return;
        }
        let ids: Vec<String> = drained.iter().map(|m| m.id.0.to_string()).collect();
        bus.emit(
            session_id,
            AgentEvent::MessageDequeued {
                count: drained.len(),
                ids,
                coalesced: false,
                content: None,
            },
        );
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Combine queued messages per the coalescing rules:
/// - 1 message passes through verbatim.
/// - 2 messages: prefix "First: " / "Also: " onto each message's first text part.
/// - ≥3 messages: prefix "[1]: ", "[2]: ", ... onto each message's first text part.
/// - A message with no text part gets the prefix inserted as a standalone
///   leading text part.
/// - Messages are separated by a lone "\n\n" text part; non-text parts are
///   preserved in original order.
fn coalesce(messages: Vec<QueuedMessage>) -> CoalescedMessage {
    let first_queued_at = messages.first().map(|m| m.queued_at).unwrap_or(0);
    let last_queued_at = messages.last().map(|m| m.queued_at).unwrap_or(0);

    let n = messages.len();
    let mut combined = Vec::new();

    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            combined.push(ContentPart::text("\n\n"));
        }

        let prefix = match n {
            1 => None,
            2 => Some(if i == 0 { "First: ".to_string() } else { "Also: ".to_string() }),
            _ => Some(format!("[{}]: ", i + 1)),
        };

        match prefix {
            None => combined.extend(message.content.iter().cloned()),
            Some(prefix) => {
                let mut prefixed_first_text = false;
                for part in &message.content {
                    match part {
                        ContentPart::Text { text } if !prefixed_first_text => {
                            combined.push(ContentPart::text(format!("{prefix}{text}")));
                            prefixed_first_text = true;
                        }
                        other => combined.push(other.clone()),
                    }
                }
                if !prefixed_first_text {
                    combined.insert(
                        combined.len() - (message.content.len()),
                        ContentPart::text(prefix),
                    );
                }
            }
        }
    }

    CoalescedMessage {
        messages,
        combined_content: combined,
        first_queued_at,
        last_queued_at,
    }
}

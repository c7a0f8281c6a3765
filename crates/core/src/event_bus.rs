//! A broadcast-channel event bus, one channel per session, generalized from
//! the teacher's per-run SSE channel (`RunStore::{subscribe,emit,cleanup_channel}`)
//! to the full `AgentEvent` taxonomy and to a per-session rather than
//! per-run key.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::events::AgentEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Owns one broadcast channel per session. Subscribers get a `Receiver`;
/// publishing to a session with no subscribers is a no-op (broadcast's
/// `send` error on zero-receivers is swallowed, matching the bus contract
/// that handlers must never impact the core loop).
pub struct EventBus {
    channels: RwLock<HashMap<String, broadcast::Sender<AgentEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a session's event stream, creating its channel if this
    /// is the first subscriber.
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<AgentEvent> {
        let mut channels = self.channels.write();
        let tx = channels
            .entry(session_id.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        tx.subscribe()
    }

    /// Publish an event to a session. Never blocks; never fails loudly.
    pub fn emit(&self, session_id: &str, event: AgentEvent) {
        let channels = self.channels.read();
        if let Some(tx) = channels.get(session_id) {
            let _ = tx.send(event);
        }
    }

    /// Drop a session's channel. Existing receivers keep whatever they've
    /// already buffered; new subscribers after this get a fresh channel.
    pub fn cleanup(&self, session_id: &str) {
        self.channels.write().remove(session_id);
    }

    /// Forward a session's events to `callback` until `cancel` is
    /// cancelled, then drop the receiver — the bus contract's "the bus
    /// removes the subscription on signal raise," implemented by letting
    /// the forwarding task's receiver drop naturally.
    pub fn subscribe_until<F>(&self, session_id: &str, cancel: crate::cancel::CancelToken, mut callback: F)
    where
        F: FnMut(AgentEvent) + Send + 'static,
    {
        let mut rx = self.subscribe(session_id);
        tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                tokio::select! {
                    event = rx.recv() => {
                        match event {
                            Ok(e) => callback(e),
                            Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
                }
            }
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

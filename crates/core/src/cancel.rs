//! Cancellation scoped to one `execute()` call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An abort signal scoped to one turn. `cancel()` is idempotent and may be
/// called from any task; the loop checks it between steps, and a
/// stream-level `abort` event is honored mid-step.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

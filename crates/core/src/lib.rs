//! The agent turn-execution core: drains queued user input, drives the
//! model through however many steps a turn takes, dispatches tool calls,
//! and keeps the context window under control via reactive compaction and
//! tool-output pruning.
//!
//! Nothing here is session-aware beyond a `session_id` string used to key
//! event-bus channels — a host wires one `TurnExecutor` per active session
//! and owns its lifecycle (see `SPEC_FULL.md` §5 for the concurrency model
//! this follows).

pub mod cancel;
pub mod context_manager;
pub mod event_bus;
pub mod events;
pub mod message_queue;
pub mod overflow;
pub mod pruning;
pub mod stream_processor;
pub mod tool_manager;
pub mod turn_executor;

pub use cancel::CancelToken;
pub use context_manager::InMemoryContextManager;
pub use event_bus::EventBus;
pub use events::{AgentEvent, ChunkType, CompactionReason};
pub use message_queue::{EnqueueResult, MessageQueue};
pub use overflow::{compact, filter_compacted, is_overflow};
pub use pruning::{prune_old_tool_outputs, PruneOutcome, PRUNE_PLACEHOLDER};
pub use stream_processor::{finish_reason_str, StepOutcome, StreamProcessor};
pub use tool_manager::ToolManager;
pub use turn_executor::{TurnExecutor, TurnOutcome};

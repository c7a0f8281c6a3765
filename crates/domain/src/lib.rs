//! Shared types for the turn-execution core: messages, content parts, token
//! usage, queued-message shapes, the error taxonomy, and configuration.
//!
//! This crate performs no I/O and holds no runtime state; it exists so
//! `turnloop-providers`, `turnloop-tools`, and `turnloop-core` agree on one
//! vocabulary.

pub mod config;
pub mod error;
pub mod message;
pub mod queue;
pub mod usage;

pub use error::{Error, Result};
pub use message::{
    CompactionMeta, ContentPart, Message, MessageContent, MessageId, Role, SanitizedToolResult,
    ToolCallRequest, ToolDefinition, ToolResultMeta,
};
pub use queue::{CoalescedMessage, QueuedMessage, QueuedMessageId};
pub use usage::{ModelLimits, TokenUsage, OUTPUT_TOKEN_MAX};

//! The provider-facing event stream: the lazy, finite, non-restartable
//! sequence `StreamProcessor` consumes exactly once per step.

use futures_core::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use turnloop_domain::{ContentPart, Error, TokenUsage};

pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Superset of provider finish reasons, widened with the states the core
/// introduces on top (`cancelled`, `max-steps`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Error,
    Other,
    Unknown,
    Cancelled,
    MaxSteps,
}

/// One chunk of a provider's streaming response. `StreamProcessor::process`
/// folds a sequence of these into persisted history and a canonical event
/// stream; see `turnloop-core::stream_processor`.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    TextDelta { text: String },
    ReasoningDelta { text: String },
    ToolCall { id: String, name: String, arguments_json: String },
    ToolResult { tool_call_id: String, content: Vec<ContentPart> },
    Error { error: Error },
    Finish { finish_reason: FinishReason, usage: Option<RawUsage> },
    Abort,
}

/// Token counts as reported by the provider, before the cache-read
/// subtraction and reasoning/cache-write disambiguation `StreamProcessor`
/// performs when finalizing `TokenUsage`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_input_tokens: u64,
    pub cache_write_tokens: u64,
    pub reasoning_tokens: u64,
}

impl RawUsage {
    /// Apply the cache-read subtraction: `inputTokens` already includes
    /// cached tokens on most providers, so they're removed to avoid
    /// double-counting against the context window.
    pub fn into_token_usage(self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.input_tokens.saturating_sub(self.cached_input_tokens),
            output_tokens: self.output_tokens,
            cache_read_tokens: self.cached_input_tokens,
            cache_write_tokens: self.cache_write_tokens,
        }
    }
}

use turnloop_domain::{Error, Message, ToolDefinition};

use crate::stream::{BoxStream, ProviderEvent};

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

/// A provider-agnostic, non-streaming chat completion response. Used only
/// for the tool-support probe (§4.1) — the turn loop otherwise always
/// streams.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub finish_reason: Option<String>,
}

/// Trait every model adapter implements. Concrete vendor wire protocols are
/// out of scope here; this crate defines the seam and a test-only mock.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Non-streaming call, used only by the tool-support probe and by
    /// compaction's summary generation.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, Error>;

    /// Streaming call, the primary entry point for a turn step.
    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, ProviderEvent>, Error>;

    /// A unique identifier for this provider instance, used to key the
    /// tool-support probe cache (`provider:model:base_url`) and to check the
    /// provider-metadata replay allowlist.
    fn provider_id(&self) -> &str;

    /// Whether this is a "native" provider with no custom endpoint — native
    /// providers bypass the tool-support probe entirely (§4.1).
    fn is_native(&self) -> bool {
        true
    }
}

//! A scripted, in-memory `LlmProvider` for exercising `turnloop-core`
//! without a real vendor adapter. Concrete vendor wire protocols are out of
//! scope for this crate (see the crate-level docs); this is the only
//! implementation here, and it is test-only by convention even though
//! nothing prevents a host from using it for offline development.

use async_stream::stream;
use parking_lot::Mutex;

use turnloop_domain::Error;

use crate::stream::{BoxStream, FinishReason, ProviderEvent, RawUsage};
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};

/// One scripted step: the events to emit, in order, for the Nth call to
/// `chat_stream`.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub events: Vec<ProviderEvent>,
}

impl ScriptedStep {
    pub fn text(text: impl Into<String>, finish: FinishReason) -> Self {
        Self {
            events: vec![
                ProviderEvent::TextDelta { text: text.into() },
                ProviderEvent::Finish {
                    finish_reason: finish,
                    usage: Some(RawUsage {
                        input_tokens: 10,
                        output_tokens: 10,
                        ..Default::default()
                    }),
                },
            ],
        }
    }

    pub fn tool_call(id: &str, name: &str, arguments_json: &str) -> Self {
        Self {
            events: vec![
                ProviderEvent::ToolCall {
                    id: id.into(),
                    name: name.into(),
                    arguments_json: arguments_json.into(),
                },
                ProviderEvent::Finish {
                    finish_reason: FinishReason::ToolCalls,
                    usage: Some(RawUsage {
                        input_tokens: 10,
                        output_tokens: 10,
                        ..Default::default()
                    }),
                },
            ],
        }
    }
}

/// A provider whose `chat_stream` replays a fixed script, one
/// `ScriptedStep` per call, cycling if exhausted. `chat` (non-streaming)
/// returns the concatenation of all `TextDelta` text in the next scripted
/// step, which is enough to drive the tool-support probe in tests.
pub struct MockProvider {
    id: String,
    native: bool,
    steps: Mutex<Vec<ScriptedStep>>,
    cursor: Mutex<usize>,
    pub tools_supported: bool,
}

impl MockProvider {
    pub fn new(id: impl Into<String>, steps: Vec<ScriptedStep>) -> Self {
        Self {
            id: id.into(),
            native: true,
            steps: Mutex::new(steps),
            cursor: Mutex::new(0),
            tools_supported: true,
        }
    }

    pub fn with_base_url(mut self) -> Self {
        self.native = false;
        self
    }

    fn next_step(&self) -> ScriptedStep {
        let steps = self.steps.lock();
        let mut cursor = self.cursor.lock();
        let step = steps[*cursor % steps.len()].clone();
        *cursor += 1;
        step
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse, Error> {
        if !self.tools_supported {
            return Err(Error::ProviderError {
                status: 400,
                body: "this model does not support tools".into(),
            });
        }
        Ok(ChatResponse {
            content: "ok".into(),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(&self, _req: &ChatRequest) -> Result<BoxStream<'static, ProviderEvent>, Error> {
        let step = self.next_step();
        let s = stream! {
            for event in step.events {
                yield event;
            }
        };
        Ok(Box::pin(s))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn is_native(&self) -> bool {
        self.native
    }
}

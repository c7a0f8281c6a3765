pub mod mock;
pub mod stream;
pub mod traits;
pub mod util;

pub use stream::{BoxStream, FinishReason, ProviderEvent, RawUsage};
pub use traits::{ChatRequest, ChatResponse, LlmProvider};

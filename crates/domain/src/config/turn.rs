use serde::{Deserialize, Serialize};

/// Per-turn execution limits recognized by `TurnExecutor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnExecutorConfig {
    /// Hard cap on loop iterations, matching the teacher's `MAX_TOOL_LOOPS`.
    #[serde(default = "d_max_steps")]
    pub max_steps: usize,
    /// Per-call output token limit.
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Per-call sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Custom endpoint; non-empty triggers tool-support probing.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for TurnExecutorConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            max_output_tokens: None,
            temperature: None,
            base_url: None,
        }
    }
}

fn d_max_steps() -> usize {
    25
}

use serde::{Deserialize, Serialize};

/// Controls `TurnExecutor::prune_old_tool_outputs` — replacing old tool
/// output content with a placeholder at format time, protecting recent
/// tool output by token budget rather than by message count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningConfig {
    /// Tokens of the most recent tool output that are never pruned.
    #[serde(default = "d_protect")]
    pub protect_recent_tokens: u64,
    /// Only mark older tool messages for pruning once cumulative prunable
    /// tokens reach this threshold.
    #[serde(default = "d_threshold")]
    pub prune_threshold_tokens: u64,
    /// Placeholder substituted for pruned tool content at format time.
    #[serde(default = "d_placeholder")]
    pub placeholder: String,
    /// Token estimate charged per image or file content part.
    #[serde(default = "d_media_tokens")]
    pub media_part_tokens: u64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            protect_recent_tokens: 40_000,
            prune_threshold_tokens: 20_000,
            placeholder: d_placeholder(),
            media_part_tokens: 1_000,
        }
    }
}

fn d_protect() -> u64 {
    40_000
}
fn d_threshold() -> u64 {
    20_000
}
fn d_placeholder() -> String {
    "[tool output pruned]".into()
}
fn d_media_tokens() -> u64 {
    1_000
}

use serde::{Deserialize, Serialize};

/// Compaction collapses old conversation history into a summary so the
/// context window doesn't overflow after many turns, without mutating the
/// underlying log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Number of most recent user-led turns to keep verbatim (uncompacted).
    #[serde(default = "d_2")]
    pub preserve_last_n_turns: usize,
    /// Minimum history length below which compaction is skipped outright.
    #[serde(default = "d_2")]
    pub min_history_for_compaction: usize,
    /// Minimum post-summary message count before a recompaction is allowed.
    #[serde(default = "d_4")]
    pub min_post_summary_for_recompaction: usize,
    /// Fallback-split floor: keep at least this many of the most recent
    /// messages when the boundary search can't isolate anything to summarize.
    #[serde(default = "d_6")]
    pub fallback_keep_floor: usize,
    /// Fallback-split ratio applied to total history length.
    #[serde(default = "d_0_2")]
    pub fallback_keep_ratio: f64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            preserve_last_n_turns: 2,
            min_history_for_compaction: 2,
            min_post_summary_for_recompaction: 4,
            fallback_keep_floor: 6,
            fallback_keep_ratio: 0.2,
        }
    }
}

fn d_2() -> usize {
    2
}
fn d_4() -> usize {
    4
}
fn d_6() -> usize {
    6
}
fn d_0_2() -> f64 {
    0.2
}

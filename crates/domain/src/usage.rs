//! Token accounting and the overflow predicate that drives compaction.

use serde::{Deserialize, Serialize};

/// A conservative ceiling above which no known model's `max_output` is
/// usefully larger. Named rather than inlined, matching the teacher's
/// `MAX_TOOL_LOOPS`-style constants.
pub const OUTPUT_TOKEN_MAX: u32 = 16_384;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_write_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_write_tokens
    }
}

/// Per-model context limits, used by the overflow predicate and pruning pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelLimits {
    pub context_window: u64,
    #[serde(default = "default_max_output")]
    pub max_output: u32,
}

fn default_max_output() -> u32 {
    OUTPUT_TOKEN_MAX
}

impl ModelLimits {
    pub fn new(context_window: u64) -> Self {
        Self {
            context_window,
            max_output: OUTPUT_TOKEN_MAX,
        }
    }

    /// Usable budget for history: the context window minus the reserved
    /// output headroom.
    pub fn history_budget(&self) -> u64 {
        self.context_window.saturating_sub(self.max_output as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_all_fields() {
        let u = TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
            cache_read_tokens: 2,
            cache_write_tokens: 1,
        };
        assert_eq!(u.total(), 18);
    }

    #[test]
    fn history_budget_subtracts_max_output() {
        let limits = ModelLimits::new(100_000);
        assert_eq!(limits.history_budget(), 100_000 - OUTPUT_TOKEN_MAX as u64);
    }
}

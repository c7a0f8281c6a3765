//! Detects context overflow from actual post-call token usage and produces
//! compaction summaries; together with `filter_compacted` this is the
//! compaction subsystem. History is never mutated — only appended to.

use chrono::Utc;

use turnloop_domain::config::CompactionConfig;
use turnloop_domain::{CompactionMeta, Message, MessageContent, ModelLimits, Role, TokenUsage};
use turnloop_providers::traits::ChatRequest;
use turnloop_providers::LlmProvider;

/// `used > contextWindow − min(maxOutput, OUTPUT_TOKEN_MAX)`, where
/// `used = inputTokens + cacheReadTokens`. Deterministic; evaluated between
/// steps, never mid-stream.
pub fn is_overflow(usage: &TokenUsage, limits: &ModelLimits) -> bool {
    let used = usage.input_tokens + usage.cache_read_tokens;
    let max_output = limits.max_output.min(turnloop_domain::OUTPUT_TOKEN_MAX);
    used > limits.context_window.saturating_sub(max_output as u64)
}

/// Find the index of the most recent summary message, if any.
fn most_recent_summary_index(history: &[Message]) -> Option<usize> {
    history.iter().rposition(|m| m.is_summary())
}

/// The read-time view: drop everything before the most recent summary.
/// Never returns older summaries; the most recent summary always occupies
/// index 0 when one exists.
///
/// `original_message_count` is always an absolute index into `history` —
/// the position the preserved tail starts at — whether this is a first
/// compaction or a recompaction (see `compact`'s "absolute-index trick").
/// The summary itself is appended after its tail at write time, so it sits
/// somewhere at or past that index too; it's excluded here by position
/// rather than re-sliced, since `result` already carries it at index 0.
pub fn filter_compacted(history: &[Message]) -> Vec<Message> {
    let Some(idx) = most_recent_summary_index(history) else {
        return history.to_vec();
    };
    let summary = &history[idx];
    let meta = summary.compaction.as_ref().expect("is_summary implies compaction is Some");
    let tail_start = meta.original_message_count;

    let mut result = vec![summary.clone()];
    result.extend(
        history
            .iter()
            .enumerate()
            .skip(tail_start)
            .filter(|(i, _)| *i != idx)
            .map(|(_, m)| m.clone()),
    );
    result
}

/// Find the start of the last `preserve_last_n_turns` user-led turns. A
/// turn starts at a user message. Returns `None` if there aren't enough
/// turns to find a non-trivial boundary.
fn turn_boundary(history: &[Message], preserve_last_n_turns: usize) -> Option<usize> {
    if preserve_last_n_turns == 0 {
        return Some(history.len());
    }
    let mut turns_seen = 0;
    for (i, msg) in history.iter().enumerate().rev() {
        if msg.role == Role::User {
            turns_seen += 1;
            if turns_seen == preserve_last_n_turns {
                return Some(i);
            }
        }
    }
    None
}

struct SplitPlan {
    to_summarize_end: usize,
    recompaction_base: Option<usize>,
}

fn plan_split(history: &[Message], config: &CompactionConfig) -> Option<SplitPlan> {
    if history.len() <= config.min_history_for_compaction {
        return None;
    }

    if let Some(summary_idx) = most_recent_summary_index(history) {
        let post_summary_start = summary_idx + 1;
        let post_summary = &history[post_summary_start..];
        if post_summary.len() < config.min_post_summary_for_recompaction {
            return None;
        }
        let boundary = turn_boundary(post_summary, config.preserve_last_n_turns)
            .map(|b| post_summary_start + b)
            .filter(|&b| b > post_summary_start);
        let to_summarize_end = boundary.unwrap_or_else(|| {
            fallback_keep_boundary(post_summary, config).map(|b| post_summary_start + b).unwrap_or(post_summary_start)
        });
        if to_summarize_end <= post_summary_start {
            return None;
        }
        return Some(SplitPlan {
            to_summarize_end,
            recompaction_base: Some(post_summary_start),
        });
    }

    let boundary = turn_boundary(history, config.preserve_last_n_turns).filter(|&b| b > 0);
    let to_summarize_end = match boundary {
        Some(b) => b,
        None => fallback_keep_boundary(history, config)?,
    };
    if to_summarize_end == 0 {
        return None;
    }
    Some(SplitPlan { to_summarize_end, recompaction_base: None })
}

/// Fallback split: keep `max(floor, ratio * length)` most recent messages.
/// Returns `None` if that keep count is ≥ the full length (nothing to cut).
fn fallback_keep_boundary(history: &[Message], config: &CompactionConfig) -> Option<usize> {
    let len = history.len();
    let ratio_keep = (len as f64 * config.fallback_keep_ratio).floor() as usize;
    let keep = config.fallback_keep_floor.max(ratio_keep);
    if keep >= len {
        None
    } else {
        Some(len - keep)
    }
}

const SUMMARY_PREFIX: &str = "[Session Compaction Summary]\n";

fn format_conversation(messages: &[Message]) -> String {
    let mut buf = String::new();
    for m in messages {
        let role = match m.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
        };
        buf.push_str(role);
        buf.push_str(": ");
        buf.push_str(&m.content.extract_all_text());
        buf.push('\n');
    }
    buf
}

fn summary_prompt(to_summarize: &[Message], current_task: &str) -> String {
    format!(
        "Summarize the following conversation history. Respond with exactly \
         this XML envelope and nothing else:\n\
         <conversation_history>...</conversation_history>\n\
         <current_task>...</current_task>\n\
         <important_context>...</important_context>\n\n\
         CURRENT TASK:\n{current_task}\n\n\
         CONVERSATION:\n{}",
        format_conversation(to_summarize)
    )
}

fn fallback_summary(current_task: &str) -> String {
    format!(
        "{SUMMARY_PREFIX}<conversation_history>Fallback summary: the summarization \
         model call failed, so this context may be incomplete.</conversation_history>\n\
         <current_task>{current_task}</current_task>\n\
         <important_context>Fallback summary in use.</important_context>"
    )
}

/// Run compaction (or recompaction) against `history`, producing the
/// summary message to append — history is never mutated in place.
pub async fn compact(
    history: &[Message],
    config: &CompactionConfig,
    provider: &dyn LlmProvider,
) -> Option<Message> {
    let plan = plan_split(history, config)?;
    let to_summarize = &history[plan.recompaction_base.unwrap_or(0)..plan.to_summarize_end];
    if to_summarize.is_empty() {
        return None;
    }

    let current_task = history
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.extract_all_text())
        .unwrap_or_default();

    let prompt = summary_prompt(to_summarize, &current_task);
    let req = ChatRequest {
        messages: vec![Message::user(MessageContent::Text(prompt), None)],
        tools: vec![],
        temperature: Some(0.1),
        max_tokens: Some(2000),
        model: None,
    };

    let summary_text = match provider.chat(&req).await {
        Ok(resp) => format!("{SUMMARY_PREFIX}{}", resp.content),
        Err(e) => {
            tracing::warn!(error = %e, "compaction summary generation failed, using fallback");
            fallback_summary(&current_task)
        }
    };

    let now = Utc::now().timestamp_millis();
    let original_first_timestamp = to_summarize.first().and_then(|m| m.timestamp);
    let original_last_timestamp = to_summarize.last().and_then(|m| m.timestamp);

    let mut message = Message::assistant_text(summary_text, Some(now));
    message.compaction = Some(match plan.recompaction_base {
        Some(base) => CompactionMeta {
            is_summary: true,
            summarized_at: now,
            // Absolute-index trick: the insert-index this summary occupies,
            // not the count summarized, so `filter_compacted` is one slice.
            original_message_count: base + (plan.to_summarize_end - base),
            original_first_timestamp,
            original_last_timestamp,
            is_recompaction: true,
        },
        None => CompactionMeta {
            is_summary: true,
            summarized_at: now,
            original_message_count: to_summarize.len(),
            original_first_timestamp,
            original_last_timestamp,
            is_recompaction: false,
        },
    });

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnloop_providers::mock::MockProvider;

    fn user(text: &str, ts: i64) -> Message {
        Message::user(MessageContent::Text(text.into()), Some(ts))
    }
    fn assistant(text: &str, ts: i64) -> Message {
        Message::assistant_text(text, Some(ts))
    }

    fn summary_message(original_message_count: usize, is_recompaction: bool, ts: i64) -> Message {
        let mut m = Message::assistant_text("[Session Compaction Summary]\nsummary", Some(ts));
        m.compaction = Some(CompactionMeta {
            is_summary: true,
            summarized_at: ts,
            original_message_count,
            original_first_timestamp: Some(0),
            original_last_timestamp: Some(ts),
            is_recompaction,
        });
        m
    }

    #[test]
    fn overflow_predicate_matches_spec_formula() {
        let limits = ModelLimits { context_window: 100_000, max_output: 8_000 };
        let usage = TokenUsage { input_tokens: 92_001, output_tokens: 0, cache_read_tokens: 0, cache_write_tokens: 0 };
        assert!(is_overflow(&usage, &limits));
        let usage_ok = TokenUsage { input_tokens: 92_000, output_tokens: 0, cache_read_tokens: 0, cache_write_tokens: 0 };
        assert!(!is_overflow(&usage_ok, &limits));
    }

    #[test]
    fn overflow_predicate_caps_max_output_at_ceiling() {
        let limits = ModelLimits { context_window: 100_000, max_output: 50_000 };
        // min(50_000, OUTPUT_TOKEN_MAX=16_384) = 16_384, so threshold is 83_616.
        let usage = TokenUsage { input_tokens: 83_617, output_tokens: 0, cache_read_tokens: 0, cache_write_tokens: 0 };
        assert!(is_overflow(&usage, &limits));
    }

    #[test]
    fn filter_compacted_with_no_summary_is_identity() {
        let history = vec![user("hi", 1), assistant("hello", 2)];
        let filtered = filter_compacted(&history);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn filter_compacted_first_compaction_slices_by_count() {
        let mut history: Vec<Message> = (0..6)
            .map(|i| if i % 2 == 0 { user(&format!("u{i}"), i as i64) } else { assistant(&format!("a{i}"), i as i64) })
            .collect();
        history.push(summary_message(2, false, 100));
        let filtered = filter_compacted(&history);
        // summary + slice[2..] (4 original messages) = 5
        assert_eq!(filtered.len(), 5);
        assert!(filtered[0].is_summary());
    }

    #[test]
    fn filter_compacted_recompaction_uses_absolute_index() {
        let mut history: Vec<Message> = vec![user("pre1", 0), user("pre2", 1)];
        history.push(summary_message(2, false, 2));
        for i in 0..6 {
            history.push(user(&format!("post{i}"), 3 + i));
        }
        let new_summary = summary_message(5, true, 200);
        history.push(new_summary);

        let filtered = filter_compacted(&history);
        assert_eq!(filtered.len(), 5);
        assert!(filtered[0].is_summary());
        assert!(filtered[0].compaction.as_ref().unwrap().is_recompaction);
    }

    #[test]
    fn filter_compacted_applied_twice_equals_once() {
        let mut history = vec![user("hi", 1), assistant("hello", 2), user("more", 3)];
        history.push(summary_message(3, false, 100));
        let once = filter_compacted(&history);
        let twice = filter_compacted(&once);
        assert_eq!(once.len(), twice.len());
    }

    #[tokio::test]
    async fn short_history_guard_skips_compaction() {
        let history = vec![user("hi", 1), assistant("hello", 2)];
        let config = CompactionConfig::default();
        let provider = MockProvider::new("mock", vec![turnloop_providers::mock::ScriptedStep::text("summary", turnloop_providers::FinishReason::Stop)]);
        let result = compact(&history, &config, &provider).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn recompaction_only_summarizes_messages_after_the_prior_summary() {
        let mut history = vec![user("pre1", 0), assistant("preA", 1)];
        history.push(summary_message(2, false, 2));
        for (i, ts) in (0..6).zip(3..9) {
            history.push(if i % 2 == 0 { user(&format!("p{i}"), ts) } else { assistant(&format!("p{i}"), ts) });
        }

        let config = CompactionConfig::default();
        let provider = MockProvider::new("mock", vec![turnloop_providers::mock::ScriptedStep::text("body", turnloop_providers::FinishReason::Stop)]);
        let summary = compact(&history, &config, &provider).await.unwrap();
        let meta = summary.compaction.unwrap();

        assert!(meta.is_recompaction);
        // Covers only p0 and p1 (the two oldest post-summary messages,
        // before the preserved last 2 user-led turns) — never the
        // pre-summary messages or the prior summary itself.
        assert_eq!(meta.original_first_timestamp, Some(3));
        assert_eq!(meta.original_last_timestamp, Some(4));
        assert_eq!(meta.original_message_count, 5);
    }

    #[tokio::test]
    async fn first_compaction_produces_summary_with_original_message_count() {
        let mut history = Vec::new();
        for i in 0..3 {
            history.push(user(&format!("u{i}"), i as i64 * 2));
            history.push(assistant(&format!("a{i}"), i as i64 * 2 + 1));
        }
        let config = CompactionConfig { preserve_last_n_turns: 2, ..CompactionConfig::default() };
        let provider = MockProvider::new("mock", vec![turnloop_providers::mock::ScriptedStep::text("body", turnloop_providers::FinishReason::Stop)]);
        let summary = compact(&history, &config, &provider).await.unwrap();
        let meta = summary.compaction.unwrap();
        assert!(!meta.is_recompaction);
        assert_eq!(meta.original_message_count, 2);
    }
}

//! Replaces old tool output with a placeholder once it's no longer in the
//! protected recency window. Mutates only the `compacted_at` marker — the
//! placeholder substitution itself happens at read time
//! (`InMemoryContextManager::formatted_messages`).

use turnloop_domain::config::PruningConfig;
use turnloop_domain::{Message, MessageId, Role};

use crate::context_manager::InMemoryContextManager;

pub const PRUNE_PLACEHOLDER: &str = "[tool output pruned]";

#[derive(Debug, Clone, Copy)]
pub struct PruneOutcome {
    pub pruned_count: usize,
    pub saved_tokens: u64,
}

fn estimate_message_tokens(message: &Message, media_part_tokens: u64) -> u64 {
    message
        .content
        .as_parts()
        .iter()
        .map(|part| match part {
            turnloop_domain::ContentPart::Text { text } => (text.len() as u64 + 3) / 4,
            turnloop_domain::ContentPart::Image { .. } | turnloop_domain::ContentPart::File { .. } => {
                media_part_tokens
            }
            turnloop_domain::ContentPart::UiResource { .. } => 0,
        })
        .sum()
}

/// Walk the history newest-to-oldest, stopping at the most recent summary
/// (messages before it are already out of view via `filter_compacted` and
/// aren't worth pruning). The first `protect_recent_tokens` worth of
/// message content — of any role — is never touched. Past that point,
/// unpruned tool messages are candidates; if their combined estimate
/// reaches `prune_threshold_tokens`, all of them are marked pruned in one
/// pass. Returns `None` if nothing crossed the threshold.
pub fn prune_old_tool_outputs(
    context: &InMemoryContextManager,
    config: &PruningConfig,
) -> Option<PruneOutcome> {
    let history = context.raw_history();
    let boundary = history.iter().rposition(|m| m.is_summary()).map(|i| i + 1).unwrap_or(0);

    let mut running_recent_tokens = 0u64;
    let mut in_protected_zone = true;
    let mut candidates: Vec<(MessageId, u64)> = Vec::new();

    for message in history[boundary..].iter().rev() {
        let tokens = estimate_message_tokens(message, config.media_part_tokens);
        if in_protected_zone {
            if running_recent_tokens + tokens <= config.protect_recent_tokens {
                running_recent_tokens += tokens;
                continue;
            }
            // This message is the one that pushes recency spend past the
            // budget — it falls outside the protected zone itself, not
            // just the ones after it.
            in_protected_zone = false;
        }
        if message.role == Role::Tool && message.compacted_at.is_none() {
            candidates.push((message.id, tokens));
        }
    }

    let prunable_total: u64 = candidates.iter().map(|(_, tokens)| tokens).sum();
    if prunable_total < config.prune_threshold_tokens {
        return None;
    }

    let ids: Vec<MessageId> = candidates.iter().map(|(id, _)| *id).collect();
    let pruned_count = ids.len();
    context.mark_messages_as_pruned(&ids);

    Some(PruneOutcome { pruned_count, saved_tokens: prunable_total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnloop_domain::{ContentPart, MessageContent};

    fn tool_msg(text: &str) -> Message {
        Message::tool_result("call-1", "search", vec![ContentPart::text(text)], Some(0))
    }

    #[test]
    fn leaves_recent_tool_output_untouched() {
        let cm = InMemoryContextManager::new();
        cm.add_message(tool_msg(&"x".repeat(40)));
        let config = PruningConfig::default();
        let outcome = prune_old_tool_outputs(&cm, &config);
        assert!(outcome.is_none());
    }

    #[test]
    fn prunes_once_threshold_crossed_past_protected_zone() {
        let cm = InMemoryContextManager::new();
        // One huge recent message fills the protected zone, pushing
        // everything before it out of the window.
        cm.add_message(tool_msg(&"a".repeat((40_000 * 4) as usize)));
        // 20_100 tokens of old tool output, comfortably over the 20_000 threshold.
        cm.add_message(tool_msg(&"b".repeat((20_100 * 4) as usize)));
        // reorder so the big protector is last (most recent)
        let mut history = cm.raw_history();
        history.reverse();
        let cm = InMemoryContextManager::with_history(history);

        let config = PruningConfig::default();
        let outcome = prune_old_tool_outputs(&cm, &config).expect("expected a prune outcome");
        assert_eq!(outcome.pruned_count, 1);
        assert!(outcome.saved_tokens >= 20_000);
    }

    #[test]
    fn does_not_reprune_already_pruned_messages() {
        let cm = InMemoryContextManager::new();
        cm.add_message(tool_msg(&"a".repeat((40_000 * 4) as usize)));
        cm.add_message(tool_msg(&"b".repeat((20_100 * 4) as usize)));
        let mut history = cm.raw_history();
        history.reverse();
        let cm = InMemoryContextManager::with_history(history);
        let config = PruningConfig::default();

        let first = prune_old_tool_outputs(&cm, &config);
        assert!(first.is_some());
        let second = prune_old_tool_outputs(&cm, &config);
        assert!(second.is_none());
    }

    #[test]
    fn ignores_messages_before_most_recent_summary() {
        let cm = InMemoryContextManager::new();
        cm.add_message(tool_msg(&"b".repeat((30_000 * 4) as usize)));
        let mut summary = Message::assistant_text("[Session Compaction Summary]\nsum", Some(1));
        summary.compaction = Some(turnloop_domain::CompactionMeta {
            is_summary: true,
            summarized_at: 1,
            original_message_count: 1,
            original_first_timestamp: Some(0),
            original_last_timestamp: Some(0),
            is_recompaction: false,
        });
        cm.append_summary(summary);
        cm.add_message(Message::user(MessageContent::Text("hi".into()), Some(2)));

        let config = PruningConfig::default();
        let outcome = prune_old_tool_outputs(&cm, &config);
        assert!(outcome.is_none());
    }
}

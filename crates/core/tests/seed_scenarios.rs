//! End-to-end coverage of the scenarios a review of this system would
//! reach for first: short-history guard, first compaction, recompaction
//! against a prior summary, repeated compaction stability, mid-turn queue
//! injection, and stream abort.

use std::sync::Arc;

use turnloop_core::{
    filter_compacted, CancelToken, EventBus, InMemoryContextManager, MessageQueue, ToolManager,
    TurnExecutor,
};
use turnloop_domain::{CompactionMeta, ContentPart, Message, MessageContent, ModelLimits};
use turnloop_providers::mock::{MockProvider, ScriptedStep};
use turnloop_providers::stream::FinishReason;
use turnloop_providers::traits::LlmProvider;
use turnloop_tools::demo::EchoTool;

fn user(text: &str, ts: i64) -> Message {
    Message::user(MessageContent::Text(text.into()), Some(ts))
}
fn assistant(text: &str, ts: i64) -> Message {
    Message::assistant_text(text, Some(ts))
}
fn summary(original_message_count: usize, is_recompaction: bool, ts: i64) -> Message {
    let mut m = Message::assistant_text("[Session Compaction Summary]\nbody", Some(ts));
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
fn scenario_short_history_guard_leaves_everything_in_view() {
    let history = vec![user("hi", 0), assistant("hello", 1)];
    assert_eq!(filter_compacted(&history).len(), 2);
}

#[test]
fn scenario_first_compaction_exposes_summary_plus_tail() {
    let mut history = vec![user("a", 0), assistant("b", 1), user("c", 2), assistant("d", 3)];
    history.push(summary(2, false, 10));
    history.push(user("e", 11));

    let view = filter_compacted(&history);
    assert_eq!(view.len(), 4);
    assert!(view[0].is_summary());
    assert_eq!(view[1].content.extract_all_text(), "c");
    assert_eq!(view[3].content.extract_all_text(), "e");
}

#[test]
fn scenario_recompaction_against_prior_summary_uses_absolute_index() {
    let mut history = vec![user("pre", 0)];
    history.push(summary(1, false, 5));
    for i in 0..4 {
        history.push(user(&format!("post{i}"), 6 + i));
    }
    // Recompaction summary covers everything through absolute index 6 (the
    // pre-summary message, the first summary, and all 4 post-summary
    // messages) — `original_message_count` is the absolute tail-start index,
    // not a count relative to the prior summary.
    history.push(summary(6, true, 50));
    history.push(user("latest", 99));

    let view = filter_compacted(&history);
    assert_eq!(view.len(), 2);
    assert!(view[0].is_summary());
    assert!(view[0].compaction.as_ref().unwrap().is_recompaction);
    assert_eq!(view[1].content.extract_all_text(), "latest");
}

#[test]
fn scenario_three_sequential_compactions_each_narrow_the_view() {
    let mut history = vec![user("a", 0), assistant("b", 1)];
    history.push(summary(2, false, 10));
    assert_eq!(filter_compacted(&history).len(), 1);

    history.push(user("c", 11));
    // Covers everything through index 4 (a, b, the first summary, c).
    history.push(summary(4, true, 20));
    assert_eq!(filter_compacted(&history).len(), 1);

    history.push(user("d", 21));
    // Covers everything through index 6 (the second summary plus d).
    history.push(summary(6, true, 30));
    let view = filter_compacted(&history);
    assert_eq!(view.len(), 1);
    assert!(view[0].is_summary());
}

#[tokio::test]
async fn scenario_mid_turn_queue_injection_coalesces_before_the_next_step() {
    let mut executor = TurnExecutor::new("session-1", ModelLimits::new(200_000));
    executor.tool_manager.register(Arc::new(EchoTool));
    // Two steps: the first tool call, then a stop — by the time the second
    // step runs, both queued messages should already be coalesced in.
    let provider = MockProvider::new(
        "mock",
        vec![
            ScriptedStep::tool_call("c1", "echo", r#"{"text":"go"}"#),
            ScriptedStep::text("acknowledged", FinishReason::Stop),
        ],
    );

    executor.queue.enqueue(vec![ContentPart::text("stop")], None, &executor.bus, "session-1");
    executor
        .queue
        .enqueue(vec![ContentPart::text("try X instead")], None, &executor.bus, "session-1");

    let outcome = executor.execute(Some(MessageContent::Text("go".into())), &provider).await.unwrap();
    assert_eq!(outcome.finish_reason, FinishReason::Stop);

    let history = executor.context.raw_history();
    let coalesced = history
        .iter()
        .find(|m| m.content.extract_all_text().contains("First: stop"))
        .expect("coalesced queue injection should appear in history");
    assert!(coalesced.content.extract_all_text().contains("Also: try X instead"));
}

#[tokio::test]
async fn scenario_stream_abort_reports_cancelled_without_a_response_event() {
    let bus = EventBus::new();
    let context = InMemoryContextManager::new();
    let assistant_id = context.add_assistant_message("");
    let cancel = CancelToken::new();
    cancel.cancel();

    let provider = MockProvider::new("mock", vec![ScriptedStep::text("never seen", FinishReason::Stop)]);
    let stream = provider.chat_stream(&Default::default()).await.unwrap();

    let processor = turnloop_core::StreamProcessor::new();
    let outcome = processor
        .process(stream, &context, assistant_id, "mock", "mock-model", &bus, "s1", &cancel)
        .await
        .unwrap();

    assert!(outcome.aborted);
    assert_eq!(outcome.finish_reason, FinishReason::Cancelled);
}

#[tokio::test]
async fn message_queue_and_tool_manager_compose_without_a_turn_executor() {
    // Sanity check that the lower-level pieces are independently usable —
    // not every host drives them through `TurnExecutor`.
    let bus = EventBus::new();
    let queue = MessageQueue::new();
    let mut manager = ToolManager::new();
    manager.register(Arc::new(EchoTool));

    queue.enqueue(vec![ContentPart::text("hi")], None, &bus, "s1");
    let coalesced = queue.dequeue_all(&bus, "s1").unwrap();
    assert_eq!(coalesced.count(), 1);

    let call = turnloop_domain::ToolCallRequest {
        id: "c1".into(),
        name: "echo".into(),
        arguments: r#"{"text":"hi"}"#.into(),
        provider_metadata: None,
    };
    let result = manager.dispatch(&call, "s1", &bus).await;
    assert!(result.meta.success);
}

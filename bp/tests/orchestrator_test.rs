//! End-to-end orchestrator tests with scripted executors

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use browserpilot::events::{EventBus, EventKind, EventPayload, RunStatus, StreamEvent};
use browserpilot::executors::{
    ExecutorError, ExecutorSet, TaskExecutor, TaskMode, TaskOutcome,
};
use browserpilot::orchestrator::{ExecutionContext, Orchestrator, RunRequest};
use browserpilot::OrchestratorConfig;

/// Narrates a short segment and one tool invocation, then succeeds
struct NarratingExecutor;

#[async_trait]
impl TaskExecutor for NarratingExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<TaskOutcome, ExecutorError> {
        ctx.emitter.start_segment();
        ctx.emitter.stream_chunk("Reading the page");
        ctx.emitter.end_segment("Reading the page layout first.");

        ctx.emitter
            .tool_starting("navigation_tool", serde_json::json!({"url": "https://a.test"}));
        ctx.emitter.tool_finished("navigation_tool", true, "Arrived");
        ctx.emitter.tool_result("navigation_tool", "ok", true);

        ctx.emitter.task_result(true, "Found the answer");
        Ok(TaskOutcome::success("Found the answer"))
    }
}

/// Parks until the run's token fires, then reports the cancellation
struct WaitForCancelExecutor;

#[async_trait]
impl TaskExecutor for WaitForCancelExecutor {
    async fn execute(&self, ctx: ExecutionContext) -> Result<TaskOutcome, ExecutorError> {
        ctx.cancel.cancelled().await;
        Err(ExecutorError::Cancelled)
    }
}

fn orchestrator_with(chat: Arc<dyn TaskExecutor>, browse: Arc<dyn TaskExecutor>) -> Arc<Orchestrator> {
    let bus = Arc::new(EventBus::new(100));
    Arc::new(Orchestrator::new(
        OrchestratorConfig::default(),
        bus,
        move |_bus: &Arc<EventBus>| ExecutorSet {
            chat: chat.clone(),
            browse: browse.clone(),
        },
    ))
}

fn statuses(bus: &EventBus) -> Vec<RunStatus> {
    bus.buffer_snapshot(None)
        .iter()
        .filter_map(|event| match &event.payload {
            EventPayload::ExecutionStatus { status } => Some(*status),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn full_run_streams_ordered_events_and_one_terminal() {
    let orchestrator = orchestrator_with(Arc::new(NarratingExecutor), Arc::new(NarratingExecutor));
    let bus = orchestrator.bus().clone();

    let summary = orchestrator
        .run(RunRequest::new("find the answer", TaskMode::Browse))
        .await;
    assert_eq!(summary.status, RunStatus::Done);

    let kinds: Vec<EventKind> = bus.buffer_snapshot(None).iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ExecutionStatus, // running
            EventKind::SegmentStart,
            EventKind::SegmentChunk,
            EventKind::SegmentEnd,
            EventKind::ToolStart,
            EventKind::ToolEnd,
            EventKind::ToolResult,
            EventKind::TaskResult,
            EventKind::ExecutionStatus, // done
        ]
    );
    assert_eq!(statuses(&bus), vec![RunStatus::Running, RunStatus::Done]);
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn segment_events_share_the_ids_from_start() {
    let orchestrator = orchestrator_with(Arc::new(NarratingExecutor), Arc::new(NarratingExecutor));
    let bus = orchestrator.bus().clone();

    orchestrator.run(RunRequest::new("go", TaskMode::Chat)).await;

    let mut established: Option<(u64, String)> = None;
    for event in bus.buffer_snapshot(None) {
        match &event.payload {
            EventPayload::SegmentStart {
                segment_id,
                message_id,
            } => {
                established = Some((*segment_id, message_id.clone()));
            }
            EventPayload::SegmentChunk {
                segment_id,
                message_id,
                ..
            }
            | EventPayload::SegmentEnd {
                segment_id,
                message_id,
                ..
            } => {
                let (expected_id, expected_message) = established.clone().expect("start must come first");
                assert_eq!(*segment_id, expected_id);
                assert_eq!(message_id, &expected_message);
            }
            _ => {}
        }
    }
    assert!(established.is_some());
}

#[tokio::test]
async fn replay_reproduces_the_buffered_stream_in_order() {
    let orchestrator = orchestrator_with(Arc::new(NarratingExecutor), Arc::new(NarratingExecutor));
    let bus = orchestrator.bus().clone();

    orchestrator.run(RunRequest::new("go", TaskMode::Browse)).await;

    let buffered: Vec<_> = bus.buffer_snapshot(None).iter().map(|e| e.id).collect();
    let mut replayed = Vec::new();
    bus.replay(None, |event: &StreamEvent| replayed.push(event.id));

    assert_eq!(replayed, buffered);
    assert!(replayed.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn second_run_supersedes_the_first_without_double_terminals() {
    // chat parks until cancelled, browse completes immediately
    let orchestrator = orchestrator_with(Arc::new(WaitForCancelExecutor), Arc::new(NarratingExecutor));
    let bus = orchestrator.bus().clone();

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .run(RunRequest::new("long task", TaskMode::Chat))
                .await
        })
    };

    // wait until the first run is locked in
    bus.wait_for(EventKind::ExecutionStatus, Some(Duration::from_secs(1)), None)
        .await
        .expect("first run must reach running");
    assert!(orchestrator.is_running());

    let second = orchestrator
        .run(RunRequest::new("new task", TaskMode::Browse))
        .await;
    let first = first.await.unwrap();

    assert_eq!(first.status, RunStatus::Cancelled);
    assert_eq!(second.status, RunStatus::Done);

    // one terminal each, in lifecycle order; superseding emits no
    // system.cancel noise
    assert_eq!(
        statuses(&bus),
        vec![
            RunStatus::Running,
            RunStatus::Cancelled,
            RunStatus::Running,
            RunStatus::Done,
        ]
    );
    let cancels = bus.buffer_snapshot(Some(&|e: &StreamEvent| e.kind() == EventKind::SystemCancel));
    assert!(cancels.is_empty());
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn user_cancel_surfaces_reason_and_single_cancelled_status() {
    let orchestrator = orchestrator_with(Arc::new(WaitForCancelExecutor), Arc::new(NarratingExecutor));
    let bus = orchestrator.bus().clone();

    let run = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .run(RunRequest::new("long task", TaskMode::Chat))
                .await
        })
    };

    bus.wait_for(EventKind::ExecutionStatus, Some(Duration::from_secs(1)), None)
        .await
        .expect("run must reach running");

    assert!(orchestrator.cancel());
    let summary = run.await.unwrap();
    assert_eq!(summary.status, RunStatus::Cancelled);

    let cancels = bus.buffer_snapshot(Some(&|e: &StreamEvent| e.kind() == EventKind::SystemCancel));
    assert_eq!(cancels.len(), 1);
    match &cancels[0].payload {
        EventPayload::SystemCancel {
            reason,
            user_initiated,
        } => {
            assert!(user_initiated);
            assert!(reason.as_deref().unwrap_or_default().contains("user"));
        }
        other => panic!("expected system.cancel, got {:?}", other.kind()),
    }
    assert_eq!(statuses(&bus), vec![RunStatus::Running, RunStatus::Cancelled]);

    // the target lock is free again: a follow-up run completes normally
    let next = orchestrator
        .run(RunRequest::new("follow-up", TaskMode::Browse))
        .await;
    assert_eq!(next.status, RunStatus::Done);
}

#[tokio::test]
async fn wait_for_task_result_times_out_cleanly() {
    let orchestrator = orchestrator_with(Arc::new(NarratingExecutor), Arc::new(NarratingExecutor));
    let bus = orchestrator.bus().clone();

    let result = bus
        .wait_for(EventKind::TaskResult, Some(Duration::from_millis(50)), None)
        .await;
    assert!(result.is_err());
    assert_eq!(bus.listener_count_for(EventKind::TaskResult), 0);
}

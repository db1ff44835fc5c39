//! Task executor seam
//!
//! The concrete browse/chat agents are external collaborators; the
//! orchestrator only knows this trait. An executor receives the shared
//! [`ExecutionContext`](crate::orchestrator::ExecutionContext), narrates its
//! progress through the context's emitter (`segment.*` for reasoning,
//! `tool.*` around tool invocations), observes the context's cancellation
//! token at its own checkpoints, and returns control on completion.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::EventBus;
use crate::orchestrator::ExecutionContext;

/// Which delegated agent handles a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Q&A over the current page/history, no browser actions
    Chat,
    /// Full browser automation
    Browse,
}

impl std::fmt::Display for TaskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskMode::Chat => f.write_str("chat"),
            TaskMode::Browse => f.write_str("browse"),
        }
    }
}

/// What a completed execution produced
#[derive(Clone, Debug)]
pub struct TaskOutcome {
    pub success: bool,
    pub summary: String,
}

impl TaskOutcome {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            success: true,
            summary: summary.into(),
        }
    }

    pub fn failure(summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
        }
    }
}

/// Errors surfaced by an executor to the orchestrator boundary
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The executor observed the run's cancellation token
    #[error("task cancelled")]
    Cancelled,

    /// A tool invocation failed beyond recovery
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// Anything else the executor could not recover from
    #[error("{0}")]
    Failed(String),
}

impl ExecutorError {
    /// Whether this error derives from the abort signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutorError::Cancelled)
    }
}

/// A delegated task agent (browse or chat)
///
/// Each `execute` call is one complete run: the executor owns its own
/// progress narration and is expected to return `ExecutorError::Cancelled`
/// when it notices the context's token at one of its checkpoints.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, ctx: ExecutionContext) -> Result<TaskOutcome, ExecutorError>;
}

/// The chat/browse executor pair owned by one orchestrator
pub struct ExecutorSet {
    pub chat: Arc<dyn TaskExecutor>,
    pub browse: Arc<dyn TaskExecutor>,
}

impl ExecutorSet {
    /// Pick the executor for a mode
    pub fn executor_for(&self, mode: TaskMode) -> Arc<dyn TaskExecutor> {
        match mode {
            TaskMode::Chat => self.chat.clone(),
            TaskMode::Browse => self.browse.clone(),
        }
    }
}

/// Builds the executor pair; `reset()` discards the old pair and calls this
/// again, guaranteeing no leaked subscriptions from previous instances
pub trait ExecutorFactory: Send + Sync {
    fn build(&self, bus: &Arc<EventBus>) -> ExecutorSet;
}

impl<F> ExecutorFactory for F
where
    F: Fn(&Arc<EventBus>) -> ExecutorSet + Send + Sync,
{
    fn build(&self, bus: &Arc<EventBus>) -> ExecutorSet {
        self(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedExecutor(&'static str);

    #[async_trait]
    impl TaskExecutor for NamedExecutor {
        async fn execute(&self, _ctx: ExecutionContext) -> Result<TaskOutcome, ExecutorError> {
            Ok(TaskOutcome::success(self.0))
        }
    }

    #[test]
    fn test_mode_display_and_serde() {
        assert_eq!(TaskMode::Chat.to_string(), "chat");
        assert_eq!(serde_json::to_string(&TaskMode::Browse).unwrap(), "\"browse\"");
        assert_eq!(serde_json::from_str::<TaskMode>("\"chat\"").unwrap(), TaskMode::Chat);
    }

    #[test]
    fn test_executor_set_dispatch() {
        let set = ExecutorSet {
            chat: Arc::new(NamedExecutor("chat")),
            browse: Arc::new(NamedExecutor("browse")),
        };
        // pointer identity distinguishes the pair
        assert!(Arc::ptr_eq(
            &set.executor_for(TaskMode::Chat),
            &set.chat
        ));
        assert!(Arc::ptr_eq(
            &set.executor_for(TaskMode::Browse),
            &set.browse
        ));
    }

    #[test]
    fn test_error_classification() {
        assert!(ExecutorError::Cancelled.is_cancelled());
        assert!(!ExecutorError::Failed("boom".to_string()).is_cancelled());
        let err = ExecutorError::ToolFailed {
            tool: "navigation_tool".to_string(),
            message: "timeout".to_string(),
        };
        assert!(!err.is_cancelled());
        assert_eq!(err.to_string(), "tool 'navigation_tool' failed: timeout");
    }
}

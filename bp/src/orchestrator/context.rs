//! Per-run execution context handed to executors

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::chunker::TokenChunker;
use crate::events::EventEmitter;
use crate::executors::TaskMode;

use super::history::MessageHistory;
use super::targets::TargetId;

/// Shared execution state for one run
///
/// Cloning is cheap; the history and emitter are shared, the token is the
/// run's cooperative abort signal. A fresh token is issued per run - tokens
/// are replaced, never reused, so a stale token cannot cancel a later run.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Identifier of this run
    pub run_id: String,
    /// The user's query text
    pub query: String,
    /// Which executor handles the run
    pub mode: TaskMode,
    /// Opaque caller metadata
    pub metadata: serde_json::Value,
    /// The locked browsing target
    pub target: TargetId,
    /// Cooperative abort signal; poll at tool boundaries and waits
    pub cancel: CancellationToken,
    /// Facade for emitting well-formed progress events
    pub emitter: Arc<EventEmitter>,
    /// Shared conversation history
    pub history: Arc<Mutex<MessageHistory>>,
    /// Per-chunk token budget for oversized artifacts
    pub chunk_budget: usize,
}

impl ExecutionContext {
    /// Whether the run has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A chunker configured with this run's token budget
    pub fn chunker(&self) -> TokenChunker {
        TokenChunker::new(self.chunk_budget)
    }
}

//! Orchestrator - owns the run lifecycle
//!
//! One orchestrator instance executes at most one run at a time
//! (single-flight): a new `run()` supersedes a still-active one by cancelling
//! its token internally and waiting for its cleanup. Every `run()` publishes
//! exactly one terminal `execution.status` (`done`, `cancelled`, or `error`)
//! and releases its browsing-target lock on every exit path. Executor errors
//! and panics are contained at this boundary - no exception ever escapes
//! `run()`.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::events::{EventBus, EventEmitter, RunStatus};
use crate::executors::{ExecutorError, ExecutorFactory, ExecutorSet, TaskMode};

use super::context::ExecutionContext;
use super::history::{Message, MessageHistory};
use super::targets::{TargetError, TargetId, TargetRegistry};

/// One task request
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub query: String,
    pub mode: TaskMode,
    pub tab_ids: Option<Vec<u64>>,
    pub metadata: serde_json::Value,
}

impl RunRequest {
    pub fn new(query: impl Into<String>, mode: TaskMode) -> Self {
        Self {
            query: query.into(),
            mode,
            tab_ids: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Scope the run to specific tabs
    pub fn with_tab_ids(mut self, tab_ids: Vec<u64>) -> Self {
        self.tab_ids = Some(tab_ids);
        self
    }

    /// Attach opaque caller metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// How a run ended, as returned to the caller
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub message: Option<String>,
}

/// Snapshot of the orchestrator's execution state
#[derive(Clone, Debug)]
pub struct ExecutionStatus {
    pub is_running: bool,
    pub locked_target_id: Option<TargetId>,
}

/// Errors classified at the orchestrator boundary
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("executor panicked")]
    ExecutorPanic,
}

struct ActiveRun {
    run_id: String,
    cancel: CancellationToken,
    target: TargetId,
    #[allow(dead_code)]
    started_at: DateTime<Utc>,
}

struct Shared {
    initialized: bool,
    executors: Option<Arc<ExecutorSet>>,
    emitter: Arc<EventEmitter>,
    history: Arc<tokio::sync::Mutex<MessageHistory>>,
}

/// Execution orchestrator for one browsing session
pub struct Orchestrator {
    config: OrchestratorConfig,
    bus: Arc<EventBus>,
    factory: Box<dyn ExecutorFactory>,
    targets: TargetRegistry,
    shared: Mutex<Shared>,
    active: Mutex<Option<ActiveRun>>,
    /// Serializes run frames: a superseding run proceeds only after the
    /// superseded frame finished its cleanup.
    run_gate: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator publishing on `bus`, building executors via
    /// `factory`
    pub fn new(config: OrchestratorConfig, bus: Arc<EventBus>, factory: impl ExecutorFactory + 'static) -> Self {
        debug!("Orchestrator::new");
        let emitter = Arc::new(EventEmitter::new(bus.clone(), "orchestrator"));
        let history = Arc::new(tokio::sync::Mutex::new(MessageHistory::new(
            config.history.token_budget,
        )));
        Self {
            config,
            bus,
            factory: Box::new(factory),
            targets: TargetRegistry::new(),
            shared: Mutex::new(Shared {
                initialized: false,
                executors: None,
                emitter,
                history,
            }),
            active: Mutex::new(None),
            run_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// The bus this orchestrator publishes on
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// One-time setup of shared execution state; a second call is a no-op
    pub fn initialize(&self) {
        let mut shared = self.shared.lock().unwrap();
        if shared.initialized {
            debug!("initialize: already initialized");
            return;
        }
        info!("initialize: building executors");
        shared.executors = Some(Arc::new(self.factory.build(&self.bus)));
        shared.initialized = true;
    }

    /// Execute one query to completion
    ///
    /// Never returns an error and never panics: executor failures are
    /// converted into the run's terminal status.
    pub async fn run(&self, request: RunRequest) -> RunSummary {
        self.initialize();
        let run_id = format!("run-{}", Uuid::now_v7());
        info!(%run_id, mode = %request.mode, "run: starting");

        // A still-active run is superseded: cancel its token internally (no
        // system.cancel), its own frame publishes its terminal status.
        if let Some(active) = &*self.active.lock().unwrap() {
            debug!(superseded = %active.run_id, "run: cancelling active run");
            active.cancel.cancel();
        }
        let _gate = self.run_gate.lock().await;

        let (emitter, history, executors) = {
            let shared = self.shared.lock().unwrap();
            (
                shared.emitter.clone(),
                shared.history.clone(),
                shared.executors.clone(),
            )
        };
        let Some(executors) = executors else {
            emitter.error("No executors available", true);
            emitter.execution_status(RunStatus::Error);
            return RunSummary {
                run_id,
                status: RunStatus::Error,
                message: Some("executors unavailable".to_string()),
            };
        };

        // Fresh token per run: a token that was cancelled for a previous run
        // is never carried over.
        let cancel = CancellationToken::new();
        let target = self.targets.resolve(request.tab_ids.as_deref());
        let guard = match self.targets.lock(target.clone(), &run_id) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(%run_id, error = %e, "run: failed to lock browsing target");
                emitter.error(&format!("Could not acquire browsing target: {e}"), true);
                emitter.execution_status(RunStatus::Error);
                return RunSummary {
                    run_id,
                    status: RunStatus::Error,
                    message: Some(e.to_string()),
                };
            }
        };

        *self.active.lock().unwrap() = Some(ActiveRun {
            run_id: run_id.clone(),
            cancel: cancel.clone(),
            target: target.clone(),
            started_at: Utc::now(),
        });
        emitter.execution_status(RunStatus::Running);

        history.lock().await.push(Message::user(request.query.clone()));

        let ctx = ExecutionContext {
            run_id: run_id.clone(),
            query: request.query.clone(),
            mode: request.mode,
            metadata: request.metadata.clone(),
            target: target.clone(),
            cancel: cancel.clone(),
            emitter: emitter.clone(),
            history: history.clone(),
            chunk_budget: self.config.chunker.max_tokens,
        };

        // The executor runs on its own task so a panic is contained at the
        // join instead of unwinding through cleanup.
        let executor = executors.executor_for(request.mode);
        let handle = tokio::spawn(async move { executor.execute(ctx).await });
        let result = match handle.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => Err(OrchestratorError::Executor(e)),
            Err(join) => {
                debug!(%run_id, is_panic = join.is_panic(), "run: executor task failed to join");
                Err(OrchestratorError::ExecutorPanic)
            }
        };

        // Finalize: exactly one terminal status per run. Cancellation wins
        // over the error shape whenever the abort signal fired.
        let (status, message) = match result {
            Ok(outcome) => {
                info!(%run_id, success = outcome.success, "run: executor finished");
                history.lock().await.push(Message::assistant(outcome.summary.clone()));
                (RunStatus::Done, Some(outcome.summary))
            }
            Err(err) => {
                let from_abort = cancel.is_cancelled()
                    || matches!(&err, OrchestratorError::Executor(e) if e.is_cancelled());
                if from_abort {
                    info!(%run_id, "run: cancelled");
                    (RunStatus::Cancelled, Some(err.to_string()))
                } else {
                    warn!(%run_id, error = %err, "run: failed");
                    emitter.error(&format!("Task failed: {err}"), true);
                    (RunStatus::Error, Some(err.to_string()))
                }
            }
        };
        emitter.execution_status(status);

        // Cleanup, on every exit path: release the target lock and the
        // active-run slot exactly once.
        drop(guard);
        *self.active.lock().unwrap() = None;
        debug!(%run_id, %status, "run: cleanup complete");

        RunSummary {
            run_id,
            status,
            message,
        }
    }

    /// User-initiated cancellation of the active run
    ///
    /// Emits `system.cancel { user_initiated: true }`; the run's own frame
    /// publishes the terminal `cancelled` status when it observes the abort.
    /// A call with no active run does nothing and emits nothing.
    pub fn cancel(&self) -> bool {
        let token = {
            let active = self.active.lock().unwrap();
            match &*active {
                Some(run) => {
                    info!(run_id = %run.run_id, "cancel: user-initiated");
                    Some(run.cancel.clone())
                }
                None => None,
            }
        };
        match token {
            Some(token) => {
                token.cancel();
                let emitter = self.shared.lock().unwrap().emitter.clone();
                emitter.cancelled(Some("Task cancelled by user"), true);
                true
            }
            None => {
                debug!("cancel: no active run");
                false
            }
        }
    }

    /// True iff a run is currently locked in
    pub fn is_running(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    /// Snapshot of the current execution state
    pub fn execution_status(&self) -> ExecutionStatus {
        let active = self.active.lock().unwrap();
        ExecutionStatus {
            is_running: active.is_some(),
            locked_target_id: active.as_ref().map(|run| run.target.clone()),
        }
    }

    /// Cancel any active run (internal, silent), rebuild the executors,
    /// clear the bus buffer and the conversation history
    ///
    /// Bus subscribers are preserved - long-lived observers stay attached
    /// across resets.
    pub async fn reset(&self) {
        info!("reset: resetting orchestrator");
        if let Some(active) = &*self.active.lock().unwrap() {
            debug!(run_id = %active.run_id, "reset: cancelling active run");
            active.cancel.cancel();
        }
        let _gate = self.run_gate.lock().await;

        let history = {
            let mut shared = self.shared.lock().unwrap();
            if shared.initialized {
                shared.executors = Some(Arc::new(self.factory.build(&self.bus)));
            }
            // a fresh emitter also resets the segment counter
            shared.emitter = Arc::new(EventEmitter::new(self.bus.clone(), "orchestrator"));
            shared.history.clone()
        };
        history.lock().await.clear();
        self.bus.clear_buffer();
    }
}

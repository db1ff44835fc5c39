//! Execution orchestration for one browsing session
//!
//! The orchestrator owns the run lifecycle: it prepares shared execution
//! state, locks the browsing target, dispatches to the selected executor,
//! classifies failures, publishes the terminal run status on the event bus,
//! and always cleans up.
//!
//! ```text
//! Idle ──► Preparing ──► Running ──► {Done | Errored | Cancelled} ──► Idle
//!              │                          ▲
//!              │  resolve + lock target   │ exactly one terminal
//!              └──────────────────────────┘ execution.status per run
//! ```

mod context;
mod engine;
mod history;
mod targets;

pub use context::ExecutionContext;
pub use engine::{ExecutionStatus, Orchestrator, OrchestratorError, RunRequest, RunSummary};
pub use history::{Message, MessageHistory, Role};
pub use targets::{TargetError, TargetGuard, TargetId, TargetRegistry};

//! BrowserPilot - orchestration core for an AI browser-automation agent
//!
//! BrowserPilot runs a single user query to completion through a pluggable
//! task executor (a "browse" automation agent or a "chat" Q&A agent) while
//! continuously publishing fine-grained progress as a typed, ordered event
//! stream that downstream consumers (a UI bridge, loggers, test harnesses)
//! subscribe to live or replay after the fact.
//!
//! # Core Concepts
//!
//! - **Single-flight execution**: at most one active run per orchestrator;
//!   a new request supersedes the prior one
//! - **Everything is an event**: the bus is the only channel for observing
//!   orchestrator and executor activity
//! - **Cooperative cancellation**: executors observe the run's token at
//!   their own checkpoints; the orchestrator never preempts
//! - **Bounded memory**: the replay buffer is a fixed-capacity FIFO, never
//!   persisted
//!
//! # Modules
//!
//! - [`events`] - typed event bus, emitter facade, UI bridge
//! - [`orchestrator`] - run lifecycle, target locking, shared history
//! - [`executors`] - the browse/chat executor seam
//! - [`chunker`] - token-budgeted splitting of oversized artifacts
//! - [`config`] - configuration types and loading
//! - [`logging`] - tracing setup for embedders and tests

pub mod chunker;
pub mod config;
pub mod events;
pub mod executors;
pub mod logging;
pub mod orchestrator;

// Re-export commonly used types
pub use chunker::{ChunkSet, TokenChunker, estimate_tokens};
pub use config::{ChunkerConfig, ConfigError, EventsConfig, HistoryConfig, OrchestratorConfig};
pub use events::{
    BusError, DisplayMessage, EventBus, EventEmitter, EventId, EventKind, EventPayload,
    MessageLevel, RunStatus, StreamEvent, UiBridge, create_event_bus,
};
pub use executors::{
    ExecutorError, ExecutorFactory, ExecutorSet, TaskExecutor, TaskMode, TaskOutcome,
};
pub use orchestrator::{
    ExecutionContext, ExecutionStatus, Message, MessageHistory, Orchestrator, OrchestratorError,
    Role, RunRequest, RunSummary, TargetId, TargetRegistry,
};

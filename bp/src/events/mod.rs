//! Event Bus Architecture for Live Observability
//!
//! This module is the only channel for observing what the orchestrator and
//! its delegated executors are doing. Every significant action emits a typed
//! event; consumers (UI bridge, loggers, tests) subscribe to the bus or
//! replay its bounded buffer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EVENT BUS                            │
//! │      (validated, buffered, synchronous fan-out)             │
//! └─────────────────────────────────────────────────────────────┘
//!         ↑                ↑                 ↑
//!    Orchestrator     Browse executor    Chat executor
//!    emits:           emits:             emits:
//!    - exec status    - segment.*        - segment.*
//!    - system.error   - tool.*           - task.result
//!    - system.cancel  - task.result
//!
//!         ↓                ↓                 ↓
//! ┌───────────┐    ┌───────────┐     ┌───────────┐
//! │ UI Bridge │    │  Tests    │     │  Loggers  │
//! │ (mpsc)    │    │ (waitFor) │     │ (replay)  │
//! └───────────┘    └───────────┘     └───────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use browserpilot::events::{EventBus, EventEmitter, EventKind};
//!
//! let bus = Arc::new(EventBus::default());
//! let emitter = EventEmitter::new(bus.clone(), "browse-executor");
//!
//! // Narrate a reasoning segment
//! let message_id = emitter.start_segment();
//! emitter.stream_chunk("Looking at the page");
//! emitter.end_segment("Looking at the page layout first.");
//!
//! // Wrap a tool invocation
//! emitter.tool_starting("navigation_tool", serde_json::json!({"url": "https://a.test"}));
//! emitter.tool_finished("navigation_tool", true, "Arrived");
//!
//! // Observe from elsewhere
//! bus.subscribe(EventKind::SegmentChunk, |event| {
//!     println!("chunk: {:?}", event.payload);
//! });
//! ```

mod bridge;
mod bus;
mod display;
mod emitter;
mod types;

pub use bridge::{DisplayMessage, UiBridge};
pub use bus::{BusError, DEFAULT_BUFFER_CAPACITY, EventBus, Listener, ListenerId, Subscription, create_event_bus};
pub use display::{ToolInfo, descriptor_for};
pub use emitter::EventEmitter;
pub use types::{
    EventId, EventKind, EventPayload, EventValidationError, MessageLevel, RunStatus, StreamEvent,
};

//! Event Emitter - the semantic facade over the bus
//!
//! Components never hand-build event payloads; the emitter guarantees
//! well-formed sequences instead. It remembers the currently open segment so
//! every `segment.chunk`/`segment.end` carries the ids its `segment.start`
//! established, and it resolves tool display info so `tool.*` events arrive
//! UI-ready. Malformed call sequences (a chunk with no open segment) are
//! defensively dropped, never propagated as corrupted events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use super::bus::EventBus;
use super::display;
use super::types::{EventPayload, MessageLevel, RunStatus};

struct OpenSegment {
    segment_id: u64,
    message_id: String,
}

/// Stateful event facade bound to one bus and one source label
///
/// One instance lives with the orchestrator (shared with its executors), so
/// segment ids keep increasing across runs and reset when the orchestrator
/// is reset.
pub struct EventEmitter {
    bus: Arc<EventBus>,
    source: String,
    segment_seq: AtomicU64,
    open: Mutex<Option<OpenSegment>>,
}

impl EventEmitter {
    /// Create an emitter publishing on `bus` with the given origin label
    pub fn new(bus: Arc<EventBus>, source: impl Into<String>) -> Self {
        let source = source.into();
        debug!(%source, "EventEmitter::new");
        Self {
            bus,
            source,
            segment_seq: AtomicU64::new(0),
            open: Mutex::new(None),
        }
    }

    /// The bus this emitter publishes on
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    fn emit(&self, payload: EventPayload) -> bool {
        self.bus.emit(self.source.clone(), payload)
    }

    // === Segments ===

    /// Open a new segment and return its message id
    ///
    /// Subsequent `stream_chunk`/`end_segment` calls are tagged with the ids
    /// established here.
    pub fn start_segment(&self) -> String {
        let segment_id = self.segment_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let message_id = format!("msg-{}", Uuid::now_v7());
        debug!(segment_id, %message_id, "EventEmitter::start_segment");

        *self.open.lock().unwrap() = Some(OpenSegment {
            segment_id,
            message_id: message_id.clone(),
        });
        self.emit(EventPayload::SegmentStart {
            segment_id,
            message_id: message_id.clone(),
        });
        message_id
    }

    /// Stream incremental text into the open segment; no-op when none is open
    pub fn stream_chunk(&self, text: &str) {
        let open = self.open.lock().unwrap();
        match &*open {
            Some(segment) => {
                let payload = EventPayload::SegmentChunk {
                    segment_id: segment.segment_id,
                    content: text.to_string(),
                    message_id: segment.message_id.clone(),
                };
                drop(open);
                self.emit(payload);
            }
            None => {
                debug!("EventEmitter::stream_chunk: no open segment, dropping chunk");
            }
        }
    }

    /// Close the open segment with its final full text
    ///
    /// Chunks are not required first - a segment may go straight from start
    /// to end. No-op when no segment is open.
    pub fn end_segment(&self, final_text: &str) {
        let taken = self.open.lock().unwrap().take();
        match taken {
            Some(segment) => {
                debug!(segment_id = segment.segment_id, "EventEmitter::end_segment");
                self.emit(EventPayload::SegmentEnd {
                    segment_id: segment.segment_id,
                    final_content: final_text.to_string(),
                    message_id: segment.message_id,
                });
            }
            None => {
                debug!("EventEmitter::end_segment: no open segment, ignoring");
            }
        }
    }

    /// Segment id that the next `start_segment` will use, minus one
    /// (i.e. how many segments this emitter has opened)
    pub fn segments_opened(&self) -> u64 {
        self.segment_seq.load(Ordering::SeqCst)
    }

    // === Tools ===

    /// Announce a tool invocation with display info resolved from its name
    pub fn tool_starting(&self, name: &str, args: serde_json::Value) {
        let info = display::descriptor_for(name, &args);
        debug!(tool = name, "EventEmitter::tool_starting");
        self.emit(EventPayload::ToolStart {
            tool_name: name.to_string(),
            display_name: info.display_name,
            icon: info.icon.to_string(),
            description: info.description,
            args,
        });
    }

    /// Incremental output from a running tool
    pub fn tool_stream(&self, name: &str, content: &str) {
        self.emit(EventPayload::ToolStream {
            tool_name: name.to_string(),
            content: content.to_string(),
        });
    }

    /// Announce a tool invocation finishing
    pub fn tool_finished(&self, name: &str, success: bool, summary: &str) {
        let info = display::descriptor_for(name, &serde_json::Value::Null);
        debug!(tool = name, success, "EventEmitter::tool_finished");
        self.emit(EventPayload::ToolEnd {
            tool_name: name.to_string(),
            display_name: info.display_name,
            result: summary.to_string(),
            raw_result: None,
            success,
        });
    }

    /// Publish a tool's user-facing result text
    ///
    /// `is_json` is set when the text parses as JSON, so renderers can
    /// pretty-print structured results.
    pub fn tool_result(&self, name: &str, content: &str, success: bool) {
        let info = display::descriptor_for(name, &serde_json::Value::Null);
        let is_json = serde_json::from_str::<serde_json::Value>(content)
            .is_ok()
            .then_some(true);
        self.emit(EventPayload::ToolResult {
            tool_name: name.to_string(),
            display_name: info.display_name,
            content: content.to_string(),
            success,
            is_json,
        });
    }

    // === System-level messages ===

    /// Informational message for the user
    pub fn info(&self, text: &str) {
        self.emit(EventPayload::SystemMessage {
            message: text.to_string(),
            level: MessageLevel::Info,
        });
    }

    /// Warning message for the user
    pub fn warning(&self, text: &str) {
        self.emit(EventPayload::SystemMessage {
            message: text.to_string(),
            level: MessageLevel::Warning,
        });
    }

    /// User-facing error
    pub fn error(&self, text: &str, fatal: bool) {
        self.emit(EventPayload::SystemError {
            error: text.to_string(),
            code: None,
            fatal,
        });
    }

    /// Status-line material ("Looking at the page...")
    pub fn thinking(&self, text: &str, category: Option<&str>) {
        self.emit(EventPayload::SystemThinking {
            message: text.to_string(),
            category: category.map(str::to_string),
        });
    }

    /// Cancellation notice
    pub fn cancelled(&self, reason: Option<&str>, user_initiated: bool) {
        self.emit(EventPayload::SystemCancel {
            reason: reason.map(str::to_string),
            user_initiated,
        });
    }

    /// Developer diagnostics; dropped entirely unless the bus carries debug
    /// events
    pub fn debug(&self, text: &str, data: Option<serde_json::Value>) {
        if !self.bus.debug_enabled() {
            return;
        }
        self.emit(EventPayload::DebugMessage {
            message: text.to_string(),
            data,
        });
    }

    /// Final outcome of the task itself
    pub fn task_result(&self, success: bool, text: &str) {
        self.emit(EventPayload::TaskResult {
            success,
            message: text.to_string(),
        });
    }

    /// Run lifecycle status (published by the orchestrator)
    pub fn execution_status(&self, status: RunStatus) {
        debug!(%status, "EventEmitter::execution_status");
        self.emit(EventPayload::ExecutionStatus { status });
    }
}

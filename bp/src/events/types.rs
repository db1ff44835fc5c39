//! Event types for BrowserPilot activity streaming
//!
//! These events are the only channel for observing what the orchestrator and
//! its delegated executors are doing:
//! - Segment lifecycle (start, chunk, end) for narrated reasoning
//! - Tool execution (start, stream, end, result)
//! - System-level messages (info/warning/error, thinking, cancellation)
//! - Run lifecycle (execution status, task result)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier for a single event: wall-clock millisecond plus a per-bus
/// sequence number, so ids stay unique and ordered even within one millisecond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    #[serde(rename = "ts")]
    pub timestamp_ms: i64,
    pub seq: u64,
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt-{}-{}", self.timestamp_ms, self.seq)
    }
}

/// Severity of a `system.message` event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// Terminal and non-terminal run states published as `execution.status`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Done,
    Cancelled,
    Error,
}

impl RunStatus {
    /// True for the states that end a run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// The closed set of event types carried by the bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    SegmentStart,
    SegmentChunk,
    SegmentEnd,
    ToolStart,
    ToolStream,
    ToolEnd,
    ToolResult,
    SystemMessage,
    SystemThinking,
    SystemError,
    SystemCancel,
    TaskResult,
    ExecutionStatus,
    DebugMessage,
}

impl EventKind {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SegmentStart => "segment.start",
            EventKind::SegmentChunk => "segment.chunk",
            EventKind::SegmentEnd => "segment.end",
            EventKind::ToolStart => "tool.start",
            EventKind::ToolStream => "tool.stream",
            EventKind::ToolEnd => "tool.end",
            EventKind::ToolResult => "tool.result",
            EventKind::SystemMessage => "system.message",
            EventKind::SystemThinking => "system.thinking",
            EventKind::SystemError => "system.error",
            EventKind::SystemCancel => "system.cancel",
            EventKind::TaskResult => "task.result",
            EventKind::ExecutionStatus => "execution.status",
            EventKind::DebugMessage => "debug.message",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payload - the vocabulary of BrowserPilot activity
///
/// One variant per event type; the variant's fields are that type's data
/// shape, so a structurally malformed event is unrepresentable. The remaining
/// semantic constraints (non-empty ids and tool names) are checked by
/// [`EventPayload::validate`] at the bus boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// A narrated segment has opened
    #[serde(rename = "segment.start", rename_all = "camelCase")]
    SegmentStart { segment_id: u64, message_id: String },
    /// Incremental text for an open segment
    #[serde(rename = "segment.chunk", rename_all = "camelCase")]
    SegmentChunk {
        segment_id: u64,
        content: String,
        message_id: String,
    },
    /// A segment has closed, carrying its final full text
    #[serde(rename = "segment.end", rename_all = "camelCase")]
    SegmentEnd {
        segment_id: u64,
        final_content: String,
        message_id: String,
    },

    /// A tool invocation is starting
    #[serde(rename = "tool.start", rename_all = "camelCase")]
    ToolStart {
        tool_name: String,
        display_name: String,
        icon: String,
        description: String,
        args: serde_json::Value,
    },
    /// Incremental tool output
    #[serde(rename = "tool.stream", rename_all = "camelCase")]
    ToolStream { tool_name: String, content: String },
    /// A tool invocation has finished
    #[serde(rename = "tool.end", rename_all = "camelCase")]
    ToolEnd {
        tool_name: String,
        display_name: String,
        result: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_result: Option<String>,
        success: bool,
    },
    /// A tool's user-facing result text
    #[serde(rename = "tool.result", rename_all = "camelCase")]
    ToolResult {
        tool_name: String,
        display_name: String,
        content: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_json: Option<bool>,
    },

    /// General system message at a given level
    #[serde(rename = "system.message", rename_all = "camelCase")]
    SystemMessage { message: String, level: MessageLevel },
    /// The agent is thinking (status line material, not narration)
    #[serde(rename = "system.thinking", rename_all = "camelCase")]
    SystemThinking {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        category: Option<String>,
    },
    /// A user-facing error
    #[serde(rename = "system.error", rename_all = "camelCase")]
    SystemError {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        fatal: bool,
    },
    /// A cancellation notice, user-initiated or not
    #[serde(rename = "system.cancel", rename_all = "camelCase")]
    SystemCancel {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        user_initiated: bool,
    },

    /// Final outcome of the task itself
    #[serde(rename = "task.result", rename_all = "camelCase")]
    TaskResult { success: bool, message: String },
    /// Run lifecycle status published by the orchestrator
    #[serde(rename = "execution.status", rename_all = "camelCase")]
    ExecutionStatus { status: RunStatus },

    /// Developer diagnostics, only emitted when the bus has debug mode on
    #[serde(rename = "debug.message", rename_all = "camelCase")]
    DebugMessage {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
}

/// Reasons an event payload can be rejected at the bus boundary
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventValidationError {
    #[error("segment id must be positive")]
    ZeroSegmentId,
    #[error("message id must not be empty")]
    EmptyMessageId,
    #[error("tool name must not be empty")]
    EmptyToolName,
    #[error("message text must not be empty")]
    EmptyMessage,
}

impl EventPayload {
    /// The event type of this payload
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::SegmentStart { .. } => EventKind::SegmentStart,
            EventPayload::SegmentChunk { .. } => EventKind::SegmentChunk,
            EventPayload::SegmentEnd { .. } => EventKind::SegmentEnd,
            EventPayload::ToolStart { .. } => EventKind::ToolStart,
            EventPayload::ToolStream { .. } => EventKind::ToolStream,
            EventPayload::ToolEnd { .. } => EventKind::ToolEnd,
            EventPayload::ToolResult { .. } => EventKind::ToolResult,
            EventPayload::SystemMessage { .. } => EventKind::SystemMessage,
            EventPayload::SystemThinking { .. } => EventKind::SystemThinking,
            EventPayload::SystemError { .. } => EventKind::SystemError,
            EventPayload::SystemCancel { .. } => EventKind::SystemCancel,
            EventPayload::TaskResult { .. } => EventKind::TaskResult,
            EventPayload::ExecutionStatus { .. } => EventKind::ExecutionStatus,
            EventPayload::DebugMessage { .. } => EventKind::DebugMessage,
        }
    }

    /// Check the semantic constraints of this payload's data shape
    pub fn validate(&self) -> Result<(), EventValidationError> {
        match self {
            EventPayload::SegmentStart {
                segment_id,
                message_id,
            }
            | EventPayload::SegmentChunk {
                segment_id,
                message_id,
                ..
            }
            | EventPayload::SegmentEnd {
                segment_id,
                message_id,
                ..
            } => {
                if *segment_id == 0 {
                    return Err(EventValidationError::ZeroSegmentId);
                }
                if message_id.is_empty() {
                    return Err(EventValidationError::EmptyMessageId);
                }
                Ok(())
            }
            EventPayload::ToolStart { tool_name, .. }
            | EventPayload::ToolStream { tool_name, .. }
            | EventPayload::ToolEnd { tool_name, .. }
            | EventPayload::ToolResult { tool_name, .. } => {
                if tool_name.is_empty() {
                    return Err(EventValidationError::EmptyToolName);
                }
                Ok(())
            }
            EventPayload::SystemMessage { message, .. } => {
                if message.is_empty() {
                    return Err(EventValidationError::EmptyMessage);
                }
                Ok(())
            }
            EventPayload::SystemError { error, .. } => {
                if error.is_empty() {
                    return Err(EventValidationError::EmptyMessage);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// An immutable, stamped event as observed by subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Unique, ordering-friendly id
    pub id: EventId,
    /// Stamp applied by the bus at emission time
    pub timestamp: DateTime<Utc>,
    /// Free-text origin label ("orchestrator", "browse-executor", ...)
    pub source: String,
    /// Typed payload
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl StreamEvent {
    /// The event type of this event
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        self.payload.kind().as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        let payload = EventPayload::SegmentStart {
            segment_id: 1,
            message_id: "msg-1".to_string(),
        };
        assert_eq!(payload.kind().as_str(), "segment.start");

        let payload = EventPayload::ExecutionStatus {
            status: RunStatus::Running,
        };
        assert_eq!(payload.kind().as_str(), "execution.status");
    }

    #[test]
    fn test_serialization_uses_dotted_type_tag() {
        let payload = EventPayload::ToolStart {
            tool_name: "navigation_tool".to_string(),
            display_name: "Navigation".to_string(),
            icon: "🧭".to_string(),
            description: "Navigating to https://a.test".to_string(),
            args: serde_json::json!({"url": "https://a.test"}),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"type\":\"tool.start\""));
        assert!(json.contains("\"toolName\":\"navigation_tool\""));

        let parsed: EventPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind(), EventKind::ToolStart);
    }

    #[test]
    fn test_segment_roundtrip_keeps_ids() {
        let payload = EventPayload::SegmentChunk {
            segment_id: 3,
            content: "partial text".to_string(),
            message_id: "msg-abc".to_string(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"segmentId\":3"));
        assert!(json.contains("\"messageId\":\"msg-abc\""));

        match serde_json::from_str::<EventPayload>(&json).unwrap() {
            EventPayload::SegmentChunk {
                segment_id,
                message_id,
                ..
            } => {
                assert_eq!(segment_id, 3);
                assert_eq!(message_id, "msg-abc");
            }
            other => panic!("expected segment.chunk, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_validate_rejects_zero_segment_id() {
        let payload = EventPayload::SegmentStart {
            segment_id: 0,
            message_id: "msg-1".to_string(),
        };
        assert_eq!(
            payload.validate(),
            Err(EventValidationError::ZeroSegmentId)
        );
    }

    #[test]
    fn test_validate_rejects_empty_tool_name() {
        let payload = EventPayload::ToolResult {
            tool_name: String::new(),
            display_name: "Navigation".to_string(),
            content: "ok".to_string(),
            success: true,
            is_json: None,
        };
        assert_eq!(payload.validate(), Err(EventValidationError::EmptyToolName));
    }

    #[test]
    fn test_validate_accepts_well_formed_payloads() {
        let payloads = vec![
            EventPayload::SegmentEnd {
                segment_id: 1,
                final_content: "done".to_string(),
                message_id: "msg-1".to_string(),
            },
            EventPayload::SystemCancel {
                reason: None,
                user_initiated: false,
            },
            EventPayload::TaskResult {
                success: true,
                message: "finished".to_string(),
            },
            EventPayload::DebugMessage {
                message: "trace".to_string(),
                data: Some(serde_json::json!({"n": 1})),
            },
        ];
        for payload in payloads {
            assert!(payload.validate().is_ok(), "{} should validate", payload.kind());
        }
    }

    #[test]
    fn test_event_id_ordering() {
        let a = EventId {
            timestamp_ms: 100,
            seq: 5,
        };
        let b = EventId {
            timestamp_ms: 100,
            seq: 6,
        };
        let c = EventId {
            timestamp_ms: 101,
            seq: 0,
        };
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.to_string(), "evt-100-5");
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Done.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::Error.is_terminal());
    }
}

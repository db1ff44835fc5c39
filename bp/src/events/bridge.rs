//! UI Bridge - forwards bus events across a transport boundary
//!
//! The bridge subscribes to every event and forwards each one, in order, as a
//! display-oriented message into an mpsc channel owned by the UI process
//! glue. It is best-effort: a full or closed channel is logged and never
//! propagates back into the emitter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::bus::{EventBus, ListenerId};
use super::types::StreamEvent;

/// Display-oriented rendition of one event
#[derive(Clone, Debug, Serialize)]
pub struct DisplayMessage {
    /// Wire name of the event type ("segment.chunk", "tool.start", ...)
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    /// The event payload as JSON (includes the `type` tag)
    pub payload: serde_json::Value,
}

impl DisplayMessage {
    fn from_event(event: &StreamEvent) -> Self {
        Self {
            kind: event.event_type().to_string(),
            timestamp: event.timestamp,
            source: event.source.clone(),
            payload: serde_json::to_value(&event.payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Bridge between the event bus and a display transport
pub struct UiBridge {
    bus: Arc<EventBus>,
    listener: ListenerId,
}

impl UiBridge {
    /// Attach to the bus, forwarding every event into `tx`
    ///
    /// Each subscriber of the channel receives every event exactly once, in
    /// emission order. Events arriving while the channel is full are dropped
    /// with a warning rather than blocking the emitter.
    pub fn attach(bus: Arc<EventBus>, tx: mpsc::Sender<DisplayMessage>) -> Self {
        debug!("UiBridge::attach");
        let listener = bus.subscribe_any(move |event| {
            let message = DisplayMessage::from_event(event);
            match tx.try_send(message) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(event_type = event.event_type(), "UiBridge: channel full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("UiBridge: channel closed");
                }
            }
        });
        Self { bus, listener }
    }

    /// Stop forwarding and remove the bus subscription
    pub fn detach(self) {
        debug!("UiBridge::detach");
        self.bus.unsubscribe(self.listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{EventPayload, MessageLevel};

    fn info_payload(text: &str) -> EventPayload {
        EventPayload::SystemMessage {
            message: text.to_string(),
            level: MessageLevel::Info,
        }
    }

    #[tokio::test]
    async fn test_bridge_forwards_in_order() {
        let bus = Arc::new(EventBus::new(100));
        let (tx, mut rx) = mpsc::channel(16);
        let _bridge = UiBridge::attach(bus.clone(), tx);

        bus.emit("test", info_payload("first"));
        bus.emit("test", info_payload("second"));
        bus.emit("test", info_payload("third"));

        let mut kinds = Vec::new();
        let mut texts = Vec::new();
        for _ in 0..3 {
            let message = rx.recv().await.unwrap();
            kinds.push(message.kind.clone());
            texts.push(message.payload["message"].as_str().unwrap().to_string());
        }
        assert!(kinds.iter().all(|k| k == "system.message"));
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_bridge_payload_carries_type_tag() {
        let bus = Arc::new(EventBus::new(100));
        let (tx, mut rx) = mpsc::channel(16);
        let _bridge = UiBridge::attach(bus.clone(), tx);

        bus.emit(
            "executor",
            EventPayload::TaskResult {
                success: true,
                message: "done".to_string(),
            },
        );

        let message = rx.recv().await.unwrap();
        assert_eq!(message.payload["type"], "task.result");
        assert_eq!(message.source, "executor");
    }

    #[tokio::test]
    async fn test_detach_stops_forwarding() {
        let bus = Arc::new(EventBus::new(100));
        let (tx, mut rx) = mpsc::channel(16);
        let bridge = UiBridge::attach(bus.clone(), tx);

        bus.emit("test", info_payload("before"));
        bridge.detach();
        bus.emit("test", info_payload("after"));

        assert_eq!(rx.recv().await.unwrap().payload["message"], "before");
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_channel_does_not_break_emitter() {
        let bus = Arc::new(EventBus::new(100));
        let (tx, rx) = mpsc::channel(16);
        let _bridge = UiBridge::attach(bus.clone(), tx);
        drop(rx);

        // emitting after the receiver is gone still succeeds
        assert!(bus.emit("test", info_payload("nobody listening")));
        assert_eq!(bus.buffer_len(), 1);
    }
}

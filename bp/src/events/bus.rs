//! Event Bus - central pub/sub system for BrowserPilot events
//!
//! The EventBus stamps, validates, and buffers every event, then delivers it
//! synchronously to matching listeners in registration order. Components emit
//! events, consumers (UI bridge, loggers, tests) subscribe. A bounded replay
//! buffer lets a late subscriber catch up on recent activity.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::types::{EventId, EventKind, EventPayload, StreamEvent};

/// Default replay buffer capacity (events)
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Callback invoked for each delivered event
pub type Listener = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

/// Handle identifying a registered listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Errors surfaced to bus callers (never to the bus itself)
#[derive(Debug, Error)]
pub enum BusError {
    #[error("timed out after {timeout:?} waiting for {kind}")]
    WaitTimeout { kind: EventKind, timeout: Duration },

    #[error("bus dropped the pending wait")]
    Disconnected,
}

enum Selector {
    /// Deliver events of any of these kinds
    Kinds(Vec<EventKind>),
    /// Deliver every event
    Any,
    /// Deliver every event passing the predicate
    Filtered(Box<dyn Fn(&StreamEvent) -> bool + Send + Sync>),
}

impl Selector {
    fn matches(&self, event: &StreamEvent) -> bool {
        match self {
            Selector::Kinds(kinds) => kinds.contains(&event.kind()),
            Selector::Any => true,
            Selector::Filtered(predicate) => predicate(event),
        }
    }

    fn observes(&self, kind: EventKind) -> bool {
        match self {
            Selector::Kinds(kinds) => kinds.contains(&kind),
            Selector::Any | Selector::Filtered(_) => true,
        }
    }
}

struct ListenerEntry {
    id: ListenerId,
    selector: Selector,
    listener: Listener,
}

struct BusInner {
    buffer: VecDeque<StreamEvent>,
    listeners: Vec<ListenerEntry>,
}

/// Central event bus for BrowserPilot activity streaming
///
/// Constructed once and shared by reference (`Arc`); the orchestrator owns it
/// and injects it into executors and facades, so tests can run multiple
/// isolated instances.
pub struct EventBus {
    inner: Mutex<BusInner>,
    capacity: usize,
    debug_enabled: bool,
    seq: AtomicU64,
    next_listener: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        Self {
            inner: Mutex::new(BusInner {
                buffer: VecDeque::with_capacity(capacity.max(1)),
                listeners: Vec::new(),
            }),
            capacity: capacity.max(1),
            debug_enabled: false,
            seq: AtomicU64::new(0),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Create a bus that also carries `debug.message` events
    pub fn with_debug(capacity: usize) -> Self {
        let mut bus = Self::new(capacity);
        bus.debug_enabled = true;
        bus
    }

    /// Whether `debug.message` events are carried at all
    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }

    /// Buffer capacity this bus was built with
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Emit an event to all matching subscribers
    ///
    /// Stamps the id and timestamp, validates the payload, appends to the
    /// replay buffer, then synchronously notifies listeners in registration
    /// order. Returns `false` (and delivers nothing) when validation fails or
    /// when a `debug.message` arrives with debug mode off - a malformed event
    /// must never crash a producer.
    pub fn emit(&self, source: impl Into<String>, payload: EventPayload) -> bool {
        let kind = payload.kind();
        if kind == EventKind::DebugMessage && !self.debug_enabled {
            return false;
        }
        if let Err(e) = payload.validate() {
            warn!(event_type = kind.as_str(), error = %e, "EventBus::emit: rejecting invalid event");
            return false;
        }

        let event = StreamEvent {
            id: self.next_id(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        };
        debug!(event_type = event.event_type(), id = %event.id, "EventBus::emit");

        // Buffer under the lock, dispatch outside it so listeners may
        // re-enter the bus (emit, subscribe, replay) without deadlocking.
        let targets: Vec<Listener> = {
            let mut inner = self.inner.lock().unwrap();
            if inner.buffer.len() == self.capacity {
                inner.buffer.pop_front();
            }
            inner.buffer.push_back(event.clone());
            inner
                .listeners
                .iter()
                .filter(|entry| entry.selector.matches(&event))
                .map(|entry| entry.listener.clone())
                .collect()
        };

        for listener in targets {
            // A panicking listener is isolated: delivery to the remaining
            // listeners continues and the buffer is already consistent.
            if panic::catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!(event_type = event.event_type(), "EventBus::emit: listener panicked");
            }
        }
        true
    }

    fn next_id(&self) -> EventId {
        EventId {
            timestamp_ms: Utc::now().timestamp_millis(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
        }
    }

    fn register(&self, selector: Selector, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        let mut inner = self.inner.lock().unwrap();
        inner.listeners.push(ListenerEntry {
            id,
            selector,
            listener,
        });
        id
    }

    /// Subscribe to a single event kind
    pub fn subscribe(
        &self,
        kind: EventKind,
        listener: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        debug!(kind = kind.as_str(), "EventBus::subscribe");
        self.register(Selector::Kinds(vec![kind]), Arc::new(listener))
    }

    /// Subscribe to several event kinds at once
    pub fn subscribe_many(
        &self,
        kinds: &[EventKind],
        listener: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        debug!(?kinds, "EventBus::subscribe_many");
        self.register(Selector::Kinds(kinds.to_vec()), Arc::new(listener))
    }

    /// Subscribe to every event regardless of kind
    pub fn subscribe_any(&self, listener: impl Fn(&StreamEvent) + Send + Sync + 'static) -> ListenerId {
        debug!("EventBus::subscribe_any");
        self.register(Selector::Any, Arc::new(listener))
    }

    /// Wildcard subscription gated by a predicate over the full event
    ///
    /// Returns a [`Subscription`] handle; calling its `cancel()` removes the
    /// listener, no separate unsubscribe call needed.
    pub fn subscribe_filtered(
        self: &Arc<Self>,
        predicate: impl Fn(&StreamEvent) -> bool + Send + Sync + 'static,
        listener: impl Fn(&StreamEvent) + Send + Sync + 'static,
    ) -> Subscription {
        debug!("EventBus::subscribe_filtered");
        let id = self.register(Selector::Filtered(Box::new(predicate)), Arc::new(listener));
        Subscription {
            id,
            bus: Arc::downgrade(self),
        }
    }

    /// Remove a listener; returns whether it was still registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.listeners.len();
        inner.listeners.retain(|entry| entry.id != id);
        let removed = inner.listeners.len() != before;
        debug!(?id, removed, "EventBus::unsubscribe");
        removed
    }

    /// Wait for the first future event of `kind` (optionally matching
    /// `predicate`)
    ///
    /// If `timeout` elapses first the future resolves to
    /// [`BusError::WaitTimeout`] and the internal listener is removed - no
    /// listener is leaked on timeout.
    pub async fn wait_for(
        &self,
        kind: EventKind,
        timeout: Option<Duration>,
        predicate: Option<Box<dyn Fn(&StreamEvent) -> bool + Send + Sync>>,
    ) -> Result<StreamEvent, BusError> {
        debug!(kind = kind.as_str(), ?timeout, "EventBus::wait_for");
        let (tx, rx) = oneshot::channel::<StreamEvent>();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let listener_slot = slot.clone();

        let id = self.register(
            Selector::Kinds(vec![kind]),
            Arc::new(move |event: &StreamEvent| {
                if let Some(pred) = &predicate
                    && !pred(event)
                {
                    return;
                }
                if let Some(tx) = listener_slot.lock().unwrap().take() {
                    let _ = tx.send(event.clone());
                }
            }),
        );

        let received = match timeout {
            Some(dur) => match tokio::time::timeout(dur, rx).await {
                Ok(result) => result.map_err(|_| BusError::Disconnected),
                Err(_) => Err(BusError::WaitTimeout { kind, timeout: dur }),
            },
            None => rx.await.map_err(|_| BusError::Disconnected),
        };
        self.unsubscribe(id);
        received
    }

    /// Synchronously deliver every buffered event (oldest first, optionally
    /// filtered) to `listener`
    ///
    /// Does not re-emit to other subscribers and does not mutate the buffer.
    pub fn replay(
        &self,
        predicate: Option<&(dyn Fn(&StreamEvent) -> bool)>,
        mut listener: impl FnMut(&StreamEvent),
    ) {
        let snapshot = self.buffer_snapshot(predicate);
        debug!(count = snapshot.len(), "EventBus::replay");
        for event in &snapshot {
            listener(event);
        }
    }

    /// Copy of the buffered events (oldest first), optionally filtered
    pub fn buffer_snapshot(&self, predicate: Option<&(dyn Fn(&StreamEvent) -> bool)>) -> Vec<StreamEvent> {
        let inner = self.inner.lock().unwrap();
        inner
            .buffer
            .iter()
            .filter(|event| predicate.map(|p| p(event)).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Drop all buffered events; subscribers are untouched
    pub fn clear_buffer(&self) {
        debug!("EventBus::clear_buffer");
        self.inner.lock().unwrap().buffer.clear();
    }

    /// Count of buffered events per event-type name
    pub fn stats(&self) -> HashMap<String, usize> {
        let inner = self.inner.lock().unwrap();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for event in &inner.buffer {
            *counts.entry(event.event_type().to_string()).or_default() += 1;
        }
        counts
    }

    /// Number of buffered events
    pub fn buffer_len(&self) -> usize {
        self.inner.lock().unwrap().buffer.len()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.lock().unwrap().listeners.len()
    }

    /// Number of registered listeners that would observe `kind`
    pub fn listener_count_for(&self, kind: EventKind) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .listeners
            .iter()
            .filter(|entry| entry.selector.observes(kind))
            .count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

/// Handle returned by [`EventBus::subscribe_filtered`]
///
/// Holds a weak reference so an outlived bus is simply a no-op to cancel.
pub struct Subscription {
    id: ListenerId,
    bus: Weak<EventBus>,
}

impl Subscription {
    /// The underlying listener id
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener from the bus
    pub fn cancel(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::default())
}

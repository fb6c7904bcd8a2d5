//! # Host Event Channel
//!
//! Everything the bridge reports back to the host travels as a named event
//! carrying a string payload. This module provides:
//! - **Event names**: the default event vocabulary ([`names`])
//! - **HostEvent**: an owned `(name, payload)` pair
//! - **EventChannel**: the single-writer conduit every command emits through
//! - **EventBus**: an in-process broadcast [`EventSink`] with filtered streams
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐  emit   ┌──────────────┐  emit(name, payload)  ┌───────────┐
//! │ initSDK task      ├────────>│              │                       │           │
//! ├───────────────────┤         │ EventChannel │    (one at a time)    │ EventSink │
//! │ authorize task    ├────────>│  (mutex-     ├──────────────────────>│  (host)   │
//! ├───────────────────┤         │  serialized) │                       │           │
//! │ getSessionData    ├────────>│              │                       │           │
//! └───────────────────┘         └──────────────┘                       └───────────┘
//! ```
//!
//! ## Ordering
//!
//! `EventChannel::emit` holds a lock for the whole handoff into the sink, so
//! two events never interleave their name and payload, and events emitted by
//! one task reach the sink in program order.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{names, EventBus, EventChannel};
//! use std::sync::Arc;
//!
//! let bus = Arc::new(EventBus::new(16));
//! let mut stream = bus.subscribe();
//!
//! let channel = EventChannel::new(bus.clone());
//! channel.emit(names::ON_INITIALIZED, "").unwrap();
//!
//! let event = stream.try_recv().unwrap();
//! assert_eq!(event.name, "onInitialized");
//! ```

use bridge_traits::EventSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{error, trace};

use crate::error::{Error, Result};

pub use tokio::sync::broadcast::error::{RecvError, SendError};

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Default event names.
///
/// The concrete vocabulary is a contract with the host integration; these
/// are the names the bridge emits out of the box.
pub mod names {
    /// `initSDK` completed.
    pub const ON_INITIALIZED: &str = "onInitialized";
    /// `authorize` completed; payload is the session grant.
    pub const ON_AUTHORIZE_SUCCESS: &str = "onAuthorizeSuccess";
    /// `getSessionAccounts` completed; payload is the account list.
    pub const ON_ACCOUNTS_SUCCESS: &str = "onAccountsSuccess";
    /// One file received during `getSessionData`.
    pub const ON_FILE_RECEIVED: &str = "fileReceiveSuccess";
    /// `getSessionData` finished; payload is the delivery summary.
    pub const ON_SESSION_DATA_COMPLETE: &str = "onSessionDataComplete";
    /// Any command failed; payload carries the error code.
    pub const ON_ERROR: &str = "onError";
    /// Diagnostic line mirrored from the bridge's logs.
    pub const NATIVE_LOG: &str = "nativeLog";
}

// ============================================================================
// Host Event
// ============================================================================

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Diagnostics (native logs)
    Debug,
    /// Results and progress
    Info,
    /// Failures
    Error,
}

/// An owned `(name, payload)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEvent {
    pub name: String,
    pub payload: String,
}

impl HostEvent {
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Event with an empty payload, signalling a void success.
    pub fn void(name: impl Into<String>) -> Self {
        Self::new(name, String::new())
    }

    /// Event whose payload is `value` serialized as JSON.
    pub fn json<T: Serialize + ?Sized>(
        name: impl Into<String>,
        value: &T,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self::new(name, serde_json::to_string(value)?))
    }

    pub fn is_error(&self) -> bool {
        self.name == names::ON_ERROR
    }

    pub fn severity(&self) -> EventSeverity {
        match self.name.as_str() {
            names::ON_ERROR => EventSeverity::Error,
            names::NATIVE_LOG => EventSeverity::Debug,
            _ => EventSeverity::Info,
        }
    }
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.payload)
        }
    }
}

// ============================================================================
// Event Channel
// ============================================================================

struct ChannelInner {
    sink: Arc<dyn EventSink>,
    write_lock: Mutex<()>,
    emitted: AtomicU64,
}

/// Serialized conduit from the bridge to the host's [`EventSink`].
///
/// Cheap to clone; clones share the same sink and lock. Safe to call from any
/// thread, including the external client's completion context.
#[derive(Clone)]
pub struct EventChannel {
    inner: Arc<ChannelInner>,
}

impl EventChannel {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                sink,
                write_lock: Mutex::new(()),
                emitted: AtomicU64::new(0),
            }),
        }
    }

    /// Hand one event to the host.
    ///
    /// Returns immediately after the sink accepted the event; never waits for
    /// the host to consume it.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidEvent` when `name` is empty
    /// - `Error::EventDelivery` when the sink rejected the event
    pub fn emit(&self, name: &str, payload: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidEvent(
                "event name must not be empty".to_string(),
            ));
        }

        let result = {
            // A panicking sink must not wedge every later emission.
            let _guard = self
                .inner
                .write_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.inner.sink.emit(name, payload)
        };

        match result {
            Ok(()) => {
                self.inner.emitted.fetch_add(1, Ordering::Relaxed);
                trace!(event = name, payload_len = payload.len(), "Event emitted");
                Ok(())
            }
            Err(err) => {
                error!(event = name, error = %err, "Host sink rejected event");
                Err(Error::EventDelivery(err))
            }
        }
    }

    /// Emit an owned [`HostEvent`].
    pub fn emit_event(&self, event: &HostEvent) -> Result<()> {
        self.emit(&event.name, &event.payload)
    }

    /// Number of events the sink has accepted.
    pub fn emitted_count(&self) -> u64 {
        self.inner.emitted.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("emitted", &self.emitted_count())
            .finish()
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// In-process broadcast sink.
///
/// Useful when the host lives in the same process (desktop shells, tests):
/// every subscriber receives every event emitted after it subscribed.
/// Subscribers that fall more than `capacity` events behind receive
/// `RecvError::Lagged`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HostEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is subscribed.
    pub fn publish(&self, event: HostEvent) -> std::result::Result<usize, SendError<HostEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl EventSink for EventBus {
    fn emit(&self, name: &str, payload: &str) -> bridge_traits::error::Result<()> {
        // A host that is not listening yet is not a delivery failure.
        let _ = self.publish(HostEvent::new(name, payload));
        Ok(())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&HostEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{names, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let errors = EventStream::new(bus.subscribe()).only(&[names::ON_ERROR]);
/// ```
pub struct EventStream {
    receiver: broadcast::Receiver<HostEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: broadcast::Receiver<HostEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HostEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only yield events whose name is one of `names`.
    pub fn only(self, names: &[&str]) -> Self {
        let wanted: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        self.filter(move |event| wanted.iter().any(|n| *n == event.name))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> std::result::Result<HostEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<std::result::Result<HostEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn accepts(&self, event: &HostEvent) -> bool {
        self.filter.as_ref().map(|f| f(event)).unwrap_or(true)
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;
    use mockall::mock;
    use mockall::predicate::eq;
    use std::thread;
    use std::time::Duration;

    mock! {
        Sink {}

        impl EventSink for Sink {
            fn emit(&self, name: &str, payload: &str) -> bridge_traits::error::Result<()>;
        }
    }

    /// Records name and payload as two separate writes so interleaving
    /// between concurrent emitters would be visible.
    #[derive(Default)]
    struct SplitWriteSink {
        writes: Mutex<Vec<String>>,
    }

    impl EventSink for SplitWriteSink {
        fn emit(&self, name: &str, payload: &str) -> bridge_traits::error::Result<()> {
            self.writes.lock().unwrap().push(name.to_string());
            thread::sleep(Duration::from_micros(50));
            self.writes.lock().unwrap().push(payload.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_channel_forwards_to_sink() {
        let mut sink = MockSink::new();
        sink.expect_emit()
            .with(eq("onInitialized"), eq(""))
            .times(1)
            .returning(|_, _| Ok(()));

        let channel = EventChannel::new(Arc::new(sink));
        channel.emit(names::ON_INITIALIZED, "").unwrap();
        assert_eq!(channel.emitted_count(), 1);
    }

    #[test]
    fn test_channel_rejects_empty_name() {
        let mut sink = MockSink::new();
        sink.expect_emit().times(0);

        let channel = EventChannel::new(Arc::new(sink));
        let result = channel.emit("", "{}");
        assert!(matches!(result, Err(Error::InvalidEvent(_))));
        assert_eq!(channel.emitted_count(), 0);
    }

    #[test]
    fn test_channel_reports_sink_failure() {
        let mut sink = MockSink::new();
        sink.expect_emit()
            .returning(|_, _| Err(BridgeError::EventRejected("bridge torn down".to_string())));

        let channel = EventChannel::new(Arc::new(sink));
        let result = channel.emit(names::ON_ERROR, "{}");
        assert!(matches!(result, Err(Error::EventDelivery(_))));
        assert_eq!(channel.emitted_count(), 0);
    }

    #[test]
    fn test_concurrent_emissions_never_interleave() {
        let sink = Arc::new(SplitWriteSink::default());
        let channel = EventChannel::new(sink.clone());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let channel = channel.clone();
                thread::spawn(move || {
                    for i in 0..20 {
                        channel
                            .emit(&format!("event-{t}"), &format!("payload-{t}-{i}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let writes = sink.writes.lock().unwrap();
        assert_eq!(writes.len(), 8 * 20 * 2);
        for pair in writes.chunks(2) {
            let thread_id = pair[0].trim_start_matches("event-");
            assert!(
                pair[1].starts_with(&format!("payload-{thread_id}-")),
                "interleaved pair: {:?}",
                pair
            );
        }
    }

    #[test]
    fn test_single_emitter_order_preserved() {
        let sink = Arc::new(SplitWriteSink::default());
        let channel = EventChannel::new(sink.clone());

        for i in 0..10 {
            channel.emit(names::ON_FILE_RECEIVED, &i.to_string()).unwrap();
        }

        let writes = sink.writes.lock().unwrap();
        let payloads: Vec<&str> = writes.iter().skip(1).step_by(2).map(|s| s.as_str()).collect();
        assert_eq!(payloads, vec!["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]);
    }

    #[test]
    fn test_host_event_helpers() {
        let event = HostEvent::json(names::ON_ACCOUNTS_SUCCESS, &vec!["a", "b"]).unwrap();
        assert_eq!(event.payload, r#"["a","b"]"#);
        assert_eq!(event.severity(), EventSeverity::Info);
        assert!(!event.is_error());

        let void = HostEvent::void(names::ON_INITIALIZED);
        assert!(void.payload.is_empty());
        assert_eq!(void.to_string(), "onInitialized");

        let err = HostEvent::new(names::ON_ERROR, r#"{"code":"NotAuthorized"}"#);
        assert!(err.is_error());
        assert_eq!(err.severity(), EventSeverity::Error);
        assert_eq!(HostEvent::void(names::NATIVE_LOG).severity(), EventSeverity::Debug);
    }

    #[tokio::test]
    async fn test_event_bus_without_subscribers_accepts_emit() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(EventSink::emit(&bus, names::ON_INITIALIZED, "").is_ok());
        assert!(bus.publish(HostEvent::void(names::ON_INITIALIZED)).is_err());
    }

    #[tokio::test]
    async fn test_event_bus_fans_out() {
        let bus = Arc::new(EventBus::new(8));
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let channel = EventChannel::new(bus.clone());
        channel.emit(names::ON_AUTHORIZE_SUCCESS, r#"{"sessionId":"abc123"}"#).unwrap();

        let event_a = a.recv().await.unwrap();
        let event_b = b.recv().await.unwrap();
        assert_eq!(event_a, event_b);
        assert_eq!(event_a.payload, r#"{"sessionId":"abc123"}"#);
    }

    #[tokio::test]
    async fn test_event_stream_filters_by_name() {
        let bus = EventBus::new(8);
        let mut stream = EventStream::new(bus.subscribe()).only(&[names::ON_ERROR]);

        EventSink::emit(&bus, names::NATIVE_LOG, "Authorizing...").unwrap();
        EventSink::emit(&bus, names::ON_ERROR, r#"{"code":"NotInitialized"}"#).unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(event.name, names::ON_ERROR);
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());

        for i in 0..5 {
            EventSink::emit(&bus, names::ON_FILE_RECEIVED, &i.to_string()).unwrap();
        }

        assert!(matches!(stream.recv().await, Err(RecvError::Lagged(_))));
    }
}

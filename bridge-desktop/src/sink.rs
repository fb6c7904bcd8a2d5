//! Event Sink Implementations for Desktop Hosts

use bridge_traits::{
    error::{BridgeError, Result},
    EventSink,
};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// One event as handed to a desktop sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: String,
}

/// Writes every event as one JSON object per line.
///
/// Suited for shells that talk to the bridge over stdio:
///
/// ```text
/// {"name":"onInitialized","payload":""}
/// {"name":"onAuthorizeSuccess","payload":"{\"sessionId\":\"abc123\"}"}
/// ```
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, name: &str, payload: &str) -> Result<()> {
        let line = serde_json::to_string(&EmittedEvent {
            name: name.to_string(),
            payload: payload.to_string(),
        })
        .map_err(|e| BridgeError::EventRejected(e.to_string()))?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| BridgeError::EventRejected("writer lock poisoned".to_string()))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

/// Forwards events into an unbounded channel, preserving emission order.
///
/// `emit` never blocks; the receiving side consumes at its own pace.
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<EmittedEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<EmittedEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, name: &str, payload: &str) -> Result<()> {
        self.sender
            .send(EmittedEvent {
                name: name.to_string(),
                payload: payload.to_string(),
            })
            .map_err(|_| {
                debug!(event = name, "Event receiver dropped");
                BridgeError::NotAvailable("event receiver dropped".to_string())
            })
    }
}

//! Host Event Sink
//!
//! The conduit through which `(name, payload)` pairs reach the host runtime.

use crate::error::Result;

/// Host-side receiver of bridge events.
///
/// Implemented once per host runtime:
/// - **React Native / mobile**: forwards to the platform event emitter
/// - **Desktop**: writes JSON lines or feeds an in-process channel
/// - **Tests**: records events for assertions
///
/// # Contract
///
/// - `emit` is a synchronous handoff. It must not wait for the host to
///   consume the event.
/// - `payload` is always an already-serialized string; an empty payload marks
///   a void success.
/// - Implementations may be called from any thread. Callers serialize
///   emissions, so an implementation never sees two calls interleave through
///   the same bridge.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::sink::EventSink;
///
/// fn announce(sink: &dyn EventSink) {
///     sink.emit("onInitialized", "").ok();
/// }
/// ```
pub trait EventSink: Send + Sync {
    /// Hand one event over to the host.
    fn emit(&self, name: &str, payload: &str) -> Result<()>;
}

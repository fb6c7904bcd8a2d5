//! # Desktop Bridge Implementations
//!
//! Host-side implementations of the bridge traits for desktop shells
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `JsonLinesSink`: `EventSink` writing one JSON object per event to any
//!   writer (stdout by default), for shells driving the bridge over stdio
//! - `ChannelEventSink`: `EventSink` feeding an unbounded Tokio channel, for
//!   hosts embedded in the same process
//! - `FileLogger`: `LoggerSink` appending structured log entries to a file in
//!   the platform data directory
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ChannelEventSink, FileLogger};
//! use std::sync::Arc;
//!
//! let (sink, mut events) = ChannelEventSink::new();
//! let config = BridgeConfig::builder()
//!     .event_sink(Arc::new(sink))
//!     // ...
//!     .build()?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{} {}", event.name, event.payload);
//! }
//! ```

mod log_file;
mod sink;

pub use log_file::FileLogger;
pub use sink::{ChannelEventSink, EmittedEvent, JsonLinesSink};

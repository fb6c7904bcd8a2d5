//! # Host Bridge Traits
//!
//! Capability contracts shared by the bridge core, the host runtime and the
//! external SDK client.
//!
//! ## Overview
//!
//! The bridge sits between two collaborators it does not control:
//!
//! ```text
//! ┌──────────────┐  command   ┌──────────────┐  async call  ┌─────────────────┐
//! │ Host runtime ├───────────>│ Bridge core  ├─────────────>│ External client │
//! │              │<───────────┤              │<─────────────┤  (SessionClient)│
//! └──────────────┘  EventSink └──────────────┘  completion  └─────────────────┘
//! ```
//!
//! Each side is represented by a trait so the core can be exercised without a
//! real host or SDK:
//!
//! - [`EventSink`](sink::EventSink) - delivers `(name, payload)` pairs to the host
//! - [`SessionClient`](client::SessionClient) - authorization and session data retrieval
//! - [`LoggerSink`](logger::LoggerSink) - mirrors structured logs into host logging
//!
//! ## Error Handling
//!
//! All traits use [`BridgeError`](error::BridgeError). Implementations should
//! convert platform-specific failures into it with a message the host can show
//! or log as-is; the bridge forwards client error descriptions unchanged.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`. Client completions may run on a
//! different thread than the one that issued the command.

pub mod client;
pub mod error;
pub mod logger;
pub mod sink;

pub use error::BridgeError;

// Re-export commonly used types
pub use client::{
    Account, ClientConfig, ContractCredentials, DeliverySender, FileDelivery, SessionClient,
    SessionFile, SessionGrant,
};
pub use logger::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use sink::EventSink;

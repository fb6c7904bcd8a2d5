//! # Bridge Core
//!
//! Command/event bridge between a host runtime and an external session SDK.
//!
//! ## Overview
//!
//! The host fires named commands (`initSDK`, `authorize`,
//! `getSessionAccounts`, `getSessionData`) at the [`BridgeModule`]. Each
//! command is forwarded to the [`SessionClient`](bridge_traits::SessionClient)
//! on a runtime task; its result comes back to the host as named events
//! carrying JSON payloads.
//!
//! ## Features
//!
//! - Fire-and-forget dispatch with awaitable [`Dispatch`] handles
//! - Session lifecycle with precondition errors (`NotInitialized`,
//!   `NotAuthorized`) derived in one place
//! - Ordered streaming of session data files, terminated only after every
//!   delivery was drained
//! - Parsing of session file identifiers into [`FileDescriptor`]s and
//!   filtering session data with a [`FileFilter`]

pub mod error;
pub mod file_id;
pub mod module;
pub mod state;
pub mod types;

pub use error::{CommandError, ErrorPayload, Result};
pub use file_id::{FileDescriptor, FileFilter, FileIdError, FilePeriod};
pub use module::{BridgeModule, Dispatch};
pub use state::SessionState;
pub use types::{Command, CommandState, FileEnvelope, SessionDataSummary};

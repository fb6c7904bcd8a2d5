//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the SDK bridge:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - The host event channel and in-process event bus
//!
//! ## Overview
//!
//! This crate holds the pieces every other bridge crate depends on: the
//! validated configuration, the serialized single-writer event channel that
//! all commands emit through, and the `tracing` setup that can mirror logs to
//! the host.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};

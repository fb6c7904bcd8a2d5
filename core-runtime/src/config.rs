//! # Bridge Configuration Module
//!
//! Provides configuration management for the SDK bridge.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`BridgeConfig`] holding the host-provided capabilities and the contract
//! settings handed to the external client. It validates eagerly so that a
//! misconfigured host fails at startup with an actionable message instead of
//! producing error events later.
//!
//! ## Required Capabilities
//!
//! - `SessionClient` - the external SDK client
//! - `EventSink` - the host event channel
//!
//! ## Required Settings
//!
//! - `app_id` / `contract_id` - identifiers issued with the data contract
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::BridgeConfig;
//! use std::sync::Arc;
//!
//! let config = BridgeConfig::builder()
//!     .session_client(Arc::new(MySdkClient::new()))
//!     .event_sink(Arc::new(MyHostEmitter::new()))
//!     .app_id("my-app")
//!     .contract_id("contract-123")
//!     .private_key("/path/to/contract.p12", "passphrase")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Credentials From The Environment
//!
//! Hosts that keep contract settings outside the binary can fill any unset
//! value from the process environment:
//!
//! | Variable                 | Setting            |
//! |--------------------------|--------------------|
//! | `BRIDGE_APP_ID`          | `app_id`           |
//! | `BRIDGE_CONTRACT_ID`     | `contract_id`      |
//! | `BRIDGE_PRIVATE_KEY`     | `private_key_path` |
//! | `BRIDGE_KEY_PASSPHRASE`  | `passphrase`       |

use crate::error::{Error, Result};
use bridge_traits::{ClientConfig, ContractCredentials, EventSink, SessionClient};
use std::path::PathBuf;
use std::sync::Arc;

/// Default capacity of the per-fetch delivery channel.
pub const DEFAULT_DELIVERY_BUFFER: usize = 64;

/// Upper bound for the delivery channel capacity.
pub const MAX_DELIVERY_BUFFER: usize = 4096;

pub const ENV_APP_ID: &str = "BRIDGE_APP_ID";
pub const ENV_CONTRACT_ID: &str = "BRIDGE_CONTRACT_ID";
pub const ENV_PRIVATE_KEY: &str = "BRIDGE_PRIVATE_KEY";
pub const ENV_KEY_PASSPHRASE: &str = "BRIDGE_KEY_PASSPHRASE";

/// Bridge configuration.
///
/// Use [`BridgeConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct BridgeConfig {
    /// External SDK client (required)
    pub session_client: Arc<dyn SessionClient>,

    /// Host event channel (required)
    pub event_sink: Arc<dyn EventSink>,

    /// Settings handed to the client on `initSDK`
    pub client: ClientConfig,

    /// Capacity of the channel the client pushes session files into
    pub delivery_buffer: usize,

    /// Mirror bridge logs to the host as `nativeLog` events
    pub forward_native_logs: bool,
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("session_client", &"SessionClient { ... }")
            .field("event_sink", &"EventSink { ... }")
            .field("client", &self.client)
            .field("delivery_buffer", &self.delivery_buffer)
            .field("forward_native_logs", &self.forward_native_logs)
            .finish()
    }
}

impl BridgeConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when identifiers are empty, the private key
    /// settings are half specified, or the delivery buffer is out of range.
    pub fn validate(&self) -> Result<()> {
        let creds = &self.client.credentials;

        if creds.app_id.trim().is_empty() {
            return Err(Error::Config("app_id must not be empty".to_string()));
        }

        if creds.contract_id.trim().is_empty() {
            return Err(Error::Config("contract_id must not be empty".to_string()));
        }

        match (&creds.private_key_path, &creds.passphrase) {
            (Some(_), None) => {
                return Err(Error::Config(
                    "private_key_path is set but no passphrase was provided".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(Error::Config(
                    "passphrase is set but no private_key_path was provided".to_string(),
                ))
            }
            _ => {}
        }

        if self.delivery_buffer == 0 {
            return Err(Error::Config(
                "delivery_buffer must be greater than 0".to_string(),
            ));
        }

        if self.delivery_buffer > MAX_DELIVERY_BUFFER {
            return Err(Error::Config(format!(
                "delivery_buffer must not exceed {} (got {})",
                MAX_DELIVERY_BUFFER, self.delivery_buffer
            )));
        }

        Ok(())
    }
}

fn session_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SessionClient".to_string(),
        message: "A SessionClient implementation is required to reach the external SDK. \
                 Mobile: wrap the platform SDK client. \
                 Desktop/tests: inject an in-process client."
            .to_string(),
    }
}

fn event_sink_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "EventSink".to_string(),
        message: "An EventSink is required to deliver results to the host. \
                 Mobile: forward to the platform event emitter. \
                 Desktop: use bridge_desktop::JsonLinesSink or ChannelEventSink."
            .to_string(),
    }
}

/// Builder for constructing [`BridgeConfig`] instances.
#[derive(Default)]
pub struct BridgeConfigBuilder {
    session_client: Option<Arc<dyn SessionClient>>,
    event_sink: Option<Arc<dyn EventSink>>,
    app_id: Option<String>,
    contract_id: Option<String>,
    private_key_path: Option<PathBuf>,
    passphrase: Option<String>,
    debug_log_enabled: bool,
    guest_enabled: bool,
    delivery_buffer: Option<usize>,
    forward_native_logs: Option<bool>,
}

impl BridgeConfigBuilder {
    /// Sets the external SDK client.
    pub fn session_client(mut self, client: Arc<dyn SessionClient>) -> Self {
        self.session_client = Some(client);
        self
    }

    /// Sets the host event sink.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn contract_id(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = Some(contract_id.into());
        self
    }

    /// Sets the contract key bundle and the passphrase that unlocks it.
    pub fn private_key(mut self, path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        self.private_key_path = Some(path.into());
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Ask the client for verbose diagnostics. Default: `false`.
    pub fn debug_log_enabled(mut self, enabled: bool) -> Self {
        self.debug_log_enabled = enabled;
        self
    }

    /// Allow the client's guest consent flow. Default: `false`.
    pub fn guest_enabled(mut self, enabled: bool) -> Self {
        self.guest_enabled = enabled;
        self
    }

    /// Capacity of the session data delivery channel.
    ///
    /// Default: [`DEFAULT_DELIVERY_BUFFER`]
    pub fn delivery_buffer(mut self, capacity: usize) -> Self {
        self.delivery_buffer = Some(capacity);
        self
    }

    /// Mirror logs to the host as `nativeLog` events. Default: `true`.
    pub fn forward_native_logs(mut self, enabled: bool) -> Self {
        self.forward_native_logs = Some(enabled);
        self
    }

    /// Fill unset contract settings through `lookup`.
    ///
    /// `lookup` receives the variable names listed in the module docs.
    pub fn credentials_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.app_id.is_none() {
            self.app_id = lookup(ENV_APP_ID);
        }
        if self.contract_id.is_none() {
            self.contract_id = lookup(ENV_CONTRACT_ID);
        }
        if self.private_key_path.is_none() {
            self.private_key_path = lookup(ENV_PRIVATE_KEY).map(PathBuf::from);
        }
        if self.passphrase.is_none() {
            self.passphrase = lookup(ENV_KEY_PASSPHRASE);
        }
        self
    }

    /// Fill unset contract settings from the process environment.
    pub fn credentials_from_env(self) -> Self {
        self.credentials_from(|key| std::env::var(key).ok())
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` if the client or the event sink is missing
    /// - `Error::Config` if a required setting is missing or invalid
    pub fn build(self) -> Result<BridgeConfig> {
        let session_client = self
            .session_client
            .ok_or_else(session_client_missing_error)?;
        let event_sink = self.event_sink.ok_or_else(event_sink_missing_error)?;

        let app_id = self.app_id.ok_or_else(|| {
            Error::Config(format!(
                "app_id is required (set it on the builder or via {})",
                ENV_APP_ID
            ))
        })?;
        let contract_id = self.contract_id.ok_or_else(|| {
            Error::Config(format!(
                "contract_id is required (set it on the builder or via {})",
                ENV_CONTRACT_ID
            ))
        })?;

        let credentials = ContractCredentials {
            app_id,
            contract_id,
            private_key_path: self.private_key_path,
            passphrase: self.passphrase,
        };

        let mut client = ClientConfig::new(credentials);
        client.debug_log_enabled = self.debug_log_enabled;
        client.guest_enabled = self.guest_enabled;

        let config = BridgeConfig {
            session_client,
            event_sink,
            client,
            delivery_buffer: self.delivery_buffer.unwrap_or(DEFAULT_DELIVERY_BUFFER),
            forward_native_logs: self.forward_native_logs.unwrap_or(true),
        };

        config.validate()?;

        Ok(config)
    }
}

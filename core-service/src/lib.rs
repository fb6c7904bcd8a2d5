//! Bridge service façade and bootstrap helpers.
//!
//! This crate wires a host-provided session client and event sink into the
//! bridge core and exposes the surface a host binding calls into: command
//! invocation by name, raw event emission, and session teardown. Desktop
//! shells typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) to get stdio and in-process event sinks.

pub mod error;

pub use error::{Result, ServiceError};

pub use bridge_traits::{ConsoleLogger, EventSink, LogLevel, LoggerSink, SessionClient};
pub use core_bridge::{
    BridgeModule, Command, CommandError, CommandState, Dispatch, FileDescriptor, FileEnvelope,
    FileFilter, SessionDataSummary,
};
pub use core_runtime::config::{BridgeConfig, BridgeConfigBuilder};
pub use core_runtime::events::names;
pub use core_runtime::logging::{LogFormat, LoggingConfig};

use std::sync::Arc;

use core_runtime::logging::{init_logging, HostLogSink};
use tracing::{debug, info};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{ChannelEventSink, EmittedEvent, FileLogger, JsonLinesSink};

/// Primary façade exposed to host applications.
#[derive(Clone, Debug)]
pub struct BridgeService {
    module: BridgeModule,
}

impl BridgeService {
    /// Create a service from a validated configuration.
    ///
    /// Must be called inside a Tokio runtime; commands run on that runtime.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let module = BridgeModule::new(config)?;
        Ok(Self { module })
    }

    /// Invoke a command by its host-facing name.
    ///
    /// Never fails at the call site; unknown names produce an
    /// `UnknownCommand` error event.
    pub fn invoke(&self, command: &str) -> Dispatch {
        debug!(command, "Host invoked command");
        self.module.invoke(command)
    }

    pub fn dispatch(&self, command: Command) -> Dispatch {
        self.module.dispatch(command)
    }

    /// `getSessionData` restricted to files accepted by `filter`.
    pub fn get_session_data_filtered(&self, filter: FileFilter) -> Dispatch {
        self.module.get_session_data_filtered(filter)
    }

    /// Emit an arbitrary event to the host.
    pub fn emit_event_with_name(&self, name: &str, payload: &str) -> Result<()> {
        Ok(self.module.emit_event_with_name(name, payload)?)
    }

    pub fn reset_session(&self) -> bool {
        self.module.reset_session()
    }

    pub fn shutdown(&self) {
        self.module.shutdown();
    }

    pub fn module(&self) -> &BridgeModule {
        &self.module
    }
}

/// Convenience bootstrapper: builds the service and installs logging.
///
/// When `forward_native_logs` is enabled and `logging` carries no sink of its
/// own, log lines at or above `logging.level` are also delivered to the host
/// as `nativeLog` events.
///
/// ```no_run
/// # async fn example(config: core_service::BridgeConfig) -> core_service::Result<()> {
/// use core_service::{bootstrap, LoggingConfig};
///
/// let service = bootstrap(config, LoggingConfig::default())?;
/// service.invoke("initSDK");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// `ServiceError::InitializationFailed` when a global logger is already
/// installed; configuration errors surface as `ServiceError::Runtime`.
pub fn bootstrap(config: BridgeConfig, mut logging: LoggingConfig) -> Result<BridgeService> {
    let forward_native_logs = config.forward_native_logs;
    let service = BridgeService::new(config)?;

    if forward_native_logs && logging.logger_sink.is_none() {
        let sink = HostLogSink::spawn(service.module().channel().clone(), logging.level)?;
        logging = logging.with_logger_sink(Arc::new(sink));
    }

    init_logging(logging).map_err(|err| ServiceError::InitializationFailed(err.to_string()))?;

    info!(native_logs = forward_native_logs, "Bridge service started");
    Ok(service)
}

/// Configuration for a desktop shell that exchanges events over stdio.
///
/// Credentials come from the `BRIDGE_*` environment variables; the caller
/// still supplies the session client.
#[cfg(feature = "desktop-shims")]
pub fn stdio_config(client: Arc<dyn SessionClient>) -> BridgeConfigBuilder {
    BridgeConfig::builder()
        .session_client(client)
        .event_sink(Arc::new(JsonLinesSink::stdout()))
        .credentials_from_env()
}

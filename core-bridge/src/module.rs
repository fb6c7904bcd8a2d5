//! # Bridge Module
//!
//! Accepts commands from the host, forwards each one to the external
//! [`SessionClient`] on a runtime task, and reports the outcome back through
//! the [`EventChannel`].
//!
//! ## Overview
//!
//! Every command is fire-and-forget: the call returns a [`Dispatch`] handle
//! immediately and the result reaches the host only as events. Each dispatch
//! ends in exactly one terminal event, either the command's success event or
//! `onError` carrying a [`CommandError`] code.
//!
//! | Command              | Success event           | Payload                  |
//! |----------------------|-------------------------|--------------------------|
//! | `initSDK`            | `onInitialized`         | empty                    |
//! | `authorize`          | `onAuthorizeSuccess`    | session grant JSON       |
//! | `getSessionAccounts` | `onAccountsSuccess`     | account list JSON        |
//! | `getSessionData`     | `fileReceiveSuccess` ×N | file envelope JSON       |
//! |                      | `onSessionDataComplete` | delivery summary JSON    |
//!
//! ## Usage
//!
//! ```ignore
//! use core_bridge::{BridgeModule, Command};
//!
//! let module = BridgeModule::new(config)?;
//! module.init_sdk().wait().await?;
//! module.dispatch(Command::Authorize);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bridge_traits::{ClientConfig, FileDelivery, SessionClient, SessionGrant};
use chrono::Utc;
use core_runtime::config::BridgeConfig;
use core_runtime::events::{names, EventChannel, HostEvent};
use core_runtime::logging::strip_path;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{CommandError, Result};
use crate::file_id::FileFilter;
use crate::state::SessionState;
use crate::types::{Command, CommandState, FileEnvelope, SessionDataSummary};

/// Handle to one dispatched command.
///
/// Dropping it does not cancel the command.
pub struct Dispatch {
    id: Uuid,
    command: Option<Command>,
    handle: JoinHandle<Result<()>>,
}

impl Dispatch {
    /// Identifier recorded as `dispatch_id` on the command's tracing span.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// `None` when the host invoked an unknown command name.
    pub fn command(&self) -> Option<Command> {
        self.command
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait until the terminal event has been emitted.
    ///
    /// Returns the error that was reported to the host, if any.
    pub async fn wait(self) -> Result<()> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(CommandError::ExternalClient(format!(
                "dispatch task failed: {}",
                join_err
            ))),
        }
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("finished", &self.is_finished())
            .finish()
    }
}

struct ModuleInner {
    client: Arc<dyn SessionClient>,
    channel: EventChannel,
    client_config: ClientConfig,
    delivery_buffer: usize,
    state: RwLock<SessionState>,
    commands: Mutex<HashMap<Command, CommandState>>,
    runtime: Handle,
}

/// Owns the external client and the event channel for the lifetime of the
/// bridge.
///
/// Cheap to clone; clones share client, channel and session state. Commands
/// may be invoked from any thread, including threads outside the runtime.
#[derive(Clone)]
pub struct BridgeModule {
    inner: Arc<ModuleInner>,
}

impl BridgeModule {
    /// Creates a module whose commands run on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// `core_runtime::Error::Internal` when called outside a runtime.
    pub fn new(config: BridgeConfig) -> core_runtime::Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            core_runtime::Error::Internal(
                "BridgeModule must be created inside a Tokio runtime".to_string(),
            )
        })?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Creates a module whose commands run on `runtime`.
    pub fn with_runtime(config: BridgeConfig, runtime: Handle) -> Self {
        let channel = EventChannel::new(config.event_sink);
        Self {
            inner: Arc::new(ModuleInner {
                client: config.session_client,
                channel,
                client_config: config.client,
                delivery_buffer: config.delivery_buffer.max(1),
                state: RwLock::new(SessionState::default()),
                commands: Mutex::new(HashMap::new()),
                runtime,
            }),
        }
    }

    /// The channel every event of this module goes through.
    pub fn channel(&self) -> &EventChannel {
        &self.inner.channel
    }

    /// Hands the configured credentials to the client.
    ///
    /// Emits `onInitialized` on success. Re-initializing forwards to the
    /// client again and keeps an existing session.
    pub fn init_sdk(&self) -> Dispatch {
        let id = Uuid::new_v4();
        let inner = Arc::clone(&self.inner);
        self.spawn_command(Command::InitSdk, id, inner.init_sdk(id))
    }

    /// Runs the client's authorization flow.
    ///
    /// Emits `onAuthorizeSuccess` with the session grant, or `NotInitialized`
    /// before a successful `initSDK`.
    pub fn authorize(&self) -> Dispatch {
        let id = Uuid::new_v4();
        let inner = Arc::clone(&self.inner);
        self.spawn_command(Command::Authorize, id, inner.authorize(id))
    }

    /// Lists the accounts of the active session.
    pub fn get_session_accounts(&self) -> Dispatch {
        let id = Uuid::new_v4();
        let inner = Arc::clone(&self.inner);
        self.spawn_command(Command::GetSessionAccounts, id, inner.get_session_accounts(id))
    }

    /// Streams the session's data files to the host.
    ///
    /// Emits one `fileReceiveSuccess` per file in the order the client
    /// produced them, then `onSessionDataComplete` once the client finished
    /// and every delivery was drained.
    pub fn get_session_data(&self) -> Dispatch {
        self.get_session_data_filtered(FileFilter::default())
    }

    /// Like [`get_session_data`](Self::get_session_data), but only files
    /// accepted by `filter` reach the host; the rest count as skipped.
    pub fn get_session_data_filtered(&self, filter: FileFilter) -> Dispatch {
        let id = Uuid::new_v4();
        let inner = Arc::clone(&self.inner);
        self.spawn_command(
            Command::GetSessionData,
            id,
            inner.get_session_data(id, filter),
        )
    }

    pub fn dispatch(&self, command: Command) -> Dispatch {
        match command {
            Command::InitSdk => self.init_sdk(),
            Command::Authorize => self.authorize(),
            Command::GetSessionAccounts => self.get_session_accounts(),
            Command::GetSessionData => self.get_session_data(),
        }
    }

    /// Dispatches a command by its host-facing name.
    ///
    /// Unknown names are reported to the host as an `UnknownCommand` error.
    pub fn invoke(&self, name: &str) -> Dispatch {
        match name.parse::<Command>() {
            Ok(command) => self.dispatch(command),
            Err(err) => {
                warn!(command = name, "Host invoked an unknown command");
                let id = Uuid::new_v4();
                let inner = Arc::clone(&self.inner);
                let handle = self.inner.runtime.spawn(async move {
                    inner.report_error(&err);
                    Err(err)
                });
                Dispatch {
                    id,
                    command: None,
                    handle,
                }
            }
        }
    }

    /// Emits an arbitrary event to the host.
    ///
    /// Returns once the sink accepted the event.
    pub fn emit_event_with_name(&self, name: &str, payload: &str) -> core_runtime::Result<()> {
        let result = self.inner.channel.emit(name, payload);
        if let Err(core_runtime::Error::InvalidEvent(reason)) = &result {
            error!(reason = %reason, "Refused to emit event");
        }
        result
    }

    /// Clears the active session; the client stays initialized.
    ///
    /// Returns whether a session was active.
    pub fn reset_session(&self) -> bool {
        let cleared = self.inner.state_mut().reset_session();
        match &cleared {
            Some(_) => info!("Session reset"),
            None => debug!("Session reset requested without an active session"),
        }
        cleared.is_some()
    }

    /// Tears the client context down; only `initSDK` works afterwards.
    pub fn shutdown(&self) {
        self.inner.state_mut().shutdown();
        info!("Bridge module shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state().is_initialized()
    }

    pub fn session(&self) -> Option<SessionGrant> {
        self.inner.state().session().cloned()
    }

    /// Last observed state of `command`.
    pub fn command_state(&self, command: Command) -> CommandState {
        self.inner
            .commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&command)
            .copied()
            .unwrap_or_default()
    }

    fn spawn_command<Fut>(&self, command: Command, id: Uuid, work: Fut) -> Dispatch
    where
        Fut: Future<Output = Result<HostEvent>> + Send + 'static,
    {
        if self.inner.set_command_state(command, CommandState::Dispatched)
            == CommandState::Dispatched
        {
            warn!(command = %command, "Command already in flight, forwarding again");
        }

        let inner = Arc::clone(&self.inner);
        let handle = self.inner.runtime.spawn(async move {
            let outcome = AssertUnwindSafe(work)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(CommandError::ExternalClient(format!(
                        "{} panicked",
                        command
                    )))
                });
            inner.finish(command, id, outcome)
        });

        Dispatch {
            id,
            command: Some(command),
            handle,
        }
    }
}

impl fmt::Debug for BridgeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeModule")
            .field("state", &self.inner.state().name())
            .field("delivery_buffer", &self.inner.delivery_buffer)
            .field("channel", &self.inner.channel)
            .finish()
    }
}

impl ModuleInner {
    fn state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the previous state.
    fn set_command_state(&self, command: Command, state: CommandState) -> CommandState {
        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(command, state)
            .unwrap_or_default()
    }

    fn report_error(&self, err: &CommandError) {
        // Delivery failures are already logged by the channel.
        let _ = self.channel.emit(names::ON_ERROR, &err.to_payload_json());
    }

    fn finish(&self, command: Command, id: Uuid, outcome: Result<HostEvent>) -> Result<()> {
        match outcome {
            Ok(event) => match self.channel.emit_event(&event) {
                Ok(()) => {
                    self.set_command_state(command, CommandState::Succeeded);
                    info!(command = %command, dispatch_id = %id, "Command succeeded");
                    Ok(())
                }
                Err(err) => {
                    error!(command = %command, dispatch_id = %id, error = %err, "Success event was not delivered");
                    let err = CommandError::from(err);
                    self.set_command_state(command, CommandState::Failed);
                    self.report_error(&err);
                    Err(err)
                }
            },
            Err(err) => {
                self.set_command_state(command, CommandState::Failed);
                self.report_error(&err);
                if err.is_precondition() {
                    warn!(command = %command, dispatch_id = %id, code = err.code(), "Command rejected");
                } else {
                    error!(command = %command, dispatch_id = %id, error = %err, "Command failed");
                }
                Err(err)
            }
        }
    }

    #[instrument(name = "initSDK", skip_all, fields(dispatch_id = %dispatch_id))]
    async fn init_sdk(self: Arc<Self>, dispatch_id: Uuid) -> Result<HostEvent> {
        let credentials = &self.client_config.credentials;
        info!(
            app_id = %credentials.app_id,
            contract_id = %credentials.contract_id,
            key_file = credentials
                .private_key_path
                .as_deref()
                .and_then(|p| p.to_str())
                .map(strip_path),
            debug_log = self.client_config.debug_log_enabled,
            guest = self.client_config.guest_enabled,
            "Initializing SDK client"
        );

        self.client.initialize(&self.client_config).await?;
        self.state_mut().mark_initialized();

        Ok(HostEvent::void(Command::InitSdk.success_event()))
    }

    #[instrument(name = "authorize", skip_all, fields(dispatch_id = %dispatch_id))]
    async fn authorize(self: Arc<Self>, dispatch_id: Uuid) -> Result<HostEvent> {
        self.state().require_initialized()?;

        info!("Starting authorization");
        let grant = self.client.authorize().await?;
        let event = HostEvent::json(Command::Authorize.success_event(), &grant)?;

        self.state_mut().authorize(grant)?;
        info!("Authorization succeeded, session active");
        Ok(event)
    }

    #[instrument(name = "getSessionAccounts", skip_all, fields(dispatch_id = %dispatch_id))]
    async fn get_session_accounts(self: Arc<Self>, dispatch_id: Uuid) -> Result<HostEvent> {
        let grant = self.state().require_session(Utc::now())?;

        let accounts = self.client.list_session_accounts(&grant).await?;
        debug!(accounts = accounts.len(), "Accounts received");

        Ok(HostEvent::json(
            Command::GetSessionAccounts.success_event(),
            &accounts,
        )?)
    }

    #[instrument(name = "getSessionData", skip_all, fields(dispatch_id = %dispatch_id))]
    async fn get_session_data(
        self: Arc<Self>,
        dispatch_id: Uuid,
        filter: FileFilter,
    ) -> Result<HostEvent> {
        let grant = self.state().require_session(Utc::now())?;
        if !filter.is_empty() {
            debug!(filter = ?filter, "Filtering session data");
        }

        let (deliveries, mut received) = mpsc::channel(self.delivery_buffer);
        let fetch = self.client.fetch_session_data(&grant, deliveries);
        let drain = async {
            let mut summary = SessionDataSummary::default();
            while let Some(delivery) = received.recv().await {
                self.handle_delivery(delivery, &filter, &mut summary);
            }
            summary
        };

        // The drain only ends once the client dropped every sender, so no
        // delivery is left behind when the terminal event goes out.
        let (fetched, summary) = tokio::join!(fetch, drain);
        fetched?;

        info!(
            files_received = summary.files_received,
            files_skipped = summary.files_skipped,
            warnings = summary.warnings,
            "Session data complete"
        );
        Ok(HostEvent::json(
            Command::GetSessionData.success_event(),
            &summary,
        )?)
    }

    fn handle_delivery(
        &self,
        delivery: FileDelivery,
        filter: &FileFilter,
        summary: &mut SessionDataSummary,
    ) {
        match delivery {
            FileDelivery::File(file) => {
                match filter.accepts(&file.identifier) {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(file_id = %file.identifier, "File filtered out");
                        summary.files_skipped += 1;
                        return;
                    }
                    Err(err) => {
                        warn!(error = %err, "Skipping file with unparseable id");
                        summary.files_skipped += 1;
                        return;
                    }
                }

                let envelope = match FileEnvelope::from_file(&file) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(file_id = %file.identifier, error = %err, "Skipping file with invalid JSON content");
                        summary.files_skipped += 1;
                        return;
                    }
                };

                let payload = match serde_json::to_string(&envelope) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(file_id = %envelope.file_id, error = %err, "File envelope could not be encoded");
                        summary.files_skipped += 1;
                        return;
                    }
                };

                match self.channel.emit(names::ON_FILE_RECEIVED, &payload) {
                    Ok(()) => {
                        summary.files_received += 1;
                        debug!(file_id = %envelope.file_id, "File delivered");
                    }
                    Err(err) => {
                        summary.files_skipped += 1;
                        warn!(file_id = %envelope.file_id, error = %err, "Host refused file event");
                    }
                }
            }
            FileDelivery::Warning { file_id, message } => {
                summary.warnings += 1;
                warn!(file_id = file_id.as_deref(), warning = %message, "Client reported a file warning");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{Account, BridgeError, DeliverySender, EventSink, SessionFile};
    use core_runtime::config::BridgeConfig;
    use mockall::mock;

    mock! {
        Client {}

        #[async_trait::async_trait]
        impl SessionClient for Client {
            async fn initialize(&self, config: &ClientConfig) -> bridge_traits::error::Result<()>;
            async fn authorize(&self) -> bridge_traits::error::Result<SessionGrant>;
            async fn list_session_accounts(&self, session: &SessionGrant) -> bridge_traits::error::Result<Vec<Account>>;
            async fn fetch_session_data(
                &self,
                session: &SessionGrant,
                deliveries: DeliverySender,
            ) -> bridge_traits::error::Result<()>;
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<(String, String)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, name: &str, payload: &str) -> bridge_traits::error::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((name.to_string(), payload.to_string()));
            Ok(())
        }
    }

    fn module_with(client: MockClient) -> (BridgeModule, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let config = BridgeConfig::builder()
            .session_client(Arc::new(client))
            .event_sink(sink.clone())
            .app_id("app")
            .contract_id("contract")
            .delivery_buffer(2)
            .build()
            .unwrap();
        (BridgeModule::new(config).unwrap(), sink)
    }

    fn ready_client() -> MockClient {
        let mut client = MockClient::new();
        client.expect_initialize().returning(|_| Ok(()));
        client
            .expect_authorize()
            .returning(|| Ok(SessionGrant::new("abc123")));
        client
    }

    #[tokio::test]
    async fn test_init_sdk_emits_initialized() {
        let mut client = MockClient::new();
        client
            .expect_initialize()
            .withf(|config| config.credentials.app_id == "app")
            .times(1)
            .returning(|_| Ok(()));
        let (module, sink) = module_with(client);

        module.init_sdk().wait().await.unwrap();

        assert_eq!(sink.events(), vec![("onInitialized".to_string(), String::new())]);
        assert!(module.is_initialized());
        assert_eq!(module.command_state(Command::InitSdk), CommandState::Succeeded);
    }

    #[tokio::test]
    async fn test_init_failure_reports_client_message() {
        let mut client = MockClient::new();
        client
            .expect_initialize()
            .returning(|_| Err(BridgeError::OperationFailed("bad contract".into())));
        let (module, sink) = module_with(client);

        let err = module.init_sdk().wait().await.unwrap_err();

        assert_eq!(err.code(), "ExternalClientError");
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "onError");
        assert!(events[0].1.contains("\"code\":\"ExternalClientError\""));
        assert!(events[0].1.contains("bad contract"));
        assert!(!module.is_initialized());
        assert_eq!(module.command_state(Command::InitSdk), CommandState::Failed);
    }

    #[tokio::test]
    async fn test_authorize_requires_init() {
        let mut client = MockClient::new();
        client.expect_authorize().never();
        let (module, sink) = module_with(client);

        let err = module.authorize().wait().await.unwrap_err();

        assert_eq!(err, CommandError::NotInitialized);
        assert_eq!(
            sink.events(),
            vec![("onError".to_string(), r#"{"code":"NotInitialized"}"#.to_string())]
        );
    }

    #[tokio::test]
    async fn test_accounts_require_session() {
        let mut client = ready_client();
        client.expect_list_session_accounts().never();
        let (module, sink) = module_with(client);

        module.init_sdk().wait().await.unwrap();
        let err = module.get_session_accounts().wait().await.unwrap_err();

        assert_eq!(err, CommandError::NotAuthorized);
        assert_eq!(sink.events()[1].1, r#"{"code":"NotAuthorized"}"#);
    }

    #[tokio::test]
    async fn test_reinit_keeps_session() {
        let (module, _sink) = module_with(ready_client());

        module.init_sdk().wait().await.unwrap();
        module.authorize().wait().await.unwrap();
        module.init_sdk().wait().await.unwrap();

        assert_eq!(module.session().unwrap().session_id, "abc123");
    }

    #[tokio::test]
    async fn test_session_data_skips_invalid_files_and_counts_warnings() {
        let mut client = ready_client();
        client.expect_fetch_session_data().returning(|_, deliveries| {
            // Buffer of 2 holds exactly these two items.
            deliveries
                .try_send(FileDelivery::File(SessionFile::new("bad", "not json")))
                .unwrap();
            deliveries
                .try_send(FileDelivery::Warning {
                    file_id: Some("f2".into()),
                    message: "decryption failed".into(),
                })
                .unwrap();
            Ok(())
        });
        let (module, sink) = module_with(client);

        module.init_sdk().wait().await.unwrap();
        module.authorize().wait().await.unwrap();
        module.get_session_data().wait().await.unwrap();

        let events = sink.events();
        let last = events.last().unwrap();
        assert_eq!(last.0, "onSessionDataComplete");
        assert_eq!(last.1, r#"{"filesReceived":0,"filesSkipped":1,"warnings":1}"#);
        assert!(!events.iter().any(|(name, _)| name == "fileReceiveSuccess"));
    }

    #[tokio::test]
    async fn test_unknown_command_name() {
        let (module, sink) = module_with(MockClient::new());

        let dispatch = module.invoke("deleteEverything");
        assert_eq!(dispatch.command(), None);
        let err = dispatch.wait().await.unwrap_err();

        assert_eq!(err.code(), "UnknownCommand");
        assert_eq!(
            sink.events(),
            vec![(
                "onError".to_string(),
                r#"{"code":"UnknownCommand","message":"deleteEverything"}"#.to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_emit_event_with_empty_name_is_rejected() {
        let (module, sink) = module_with(MockClient::new());

        assert!(matches!(
            module.emit_event_with_name("", "{}"),
            Err(core_runtime::Error::InvalidEvent(_))
        ));
        module.emit_event_with_name("custom", "{}").unwrap();

        assert_eq!(sink.events(), vec![("custom".to_string(), "{}".to_string())]);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let config = BridgeConfig::builder()
            .session_client(Arc::new(MockClient::new()))
            .event_sink(Arc::new(RecordingSink::default()))
            .app_id("app")
            .contract_id("contract")
            .build()
            .unwrap();

        assert!(matches!(
            BridgeModule::new(config),
            Err(core_runtime::Error::Internal(_))
        ));
    }
}

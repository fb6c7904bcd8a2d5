//! Integration tests for the service façade
//!
//! Exercises the host-facing surface end to end with a mocked session client
//! and the desktop channel sink.

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{Account, ClientConfig, DeliverySender, FileDelivery, SessionFile, SessionGrant};
use core_service::{
    bootstrap, names, BridgeConfig, BridgeService, ChannelEventSink, EmittedEvent, FileFilter,
    LogFormat, LogLevel, LoggingConfig, ServiceError, SessionClient,
};
use mockall::mock;
use tokio::sync::mpsc::UnboundedReceiver;

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

fn config_with(client: MockClient, forward_native_logs: bool) -> (BridgeConfig, UnboundedReceiver<EmittedEvent>) {
    let (sink, events) = ChannelEventSink::new();
    let config = BridgeConfig::builder()
        .session_client(Arc::new(client))
        .event_sink(Arc::new(sink))
        .app_id("app")
        .contract_id("contract")
        .debug_log_enabled(true)
        .forward_native_logs(forward_native_logs)
        .build()
        .unwrap();
    (config, events)
}

async fn next_event(events: &mut UnboundedReceiver<EmittedEvent>) -> EmittedEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("event within timeout")
        .expect("sink still open")
}

#[tokio::test]
async fn test_invoke_by_name_reaches_client() {
    let mut client = MockClient::new();
    client
        .expect_initialize()
        .withf(|config| config.debug_log_enabled && config.credentials.contract_id == "contract")
        .times(1)
        .returning(|_| Ok(()));
    client
        .expect_authorize()
        .times(1)
        .returning(|| Ok(SessionGrant::new("abc123")));
    client
        .expect_list_session_accounts()
        .returning(|_| Ok(vec![Account::new("1"), Account::new("2")]));
    let (config, mut events) = config_with(client, false);
    let service = BridgeService::new(config).unwrap();

    service.invoke("initSDK").wait().await.unwrap();
    service.invoke("authorize").wait().await.unwrap();
    service.invoke("getSessionAccounts").wait().await.unwrap();

    assert_eq!(next_event(&mut events).await.name, names::ON_INITIALIZED);
    assert_eq!(next_event(&mut events).await.name, names::ON_AUTHORIZE_SUCCESS);
    let accounts = next_event(&mut events).await;
    assert_eq!(accounts.name, names::ON_ACCOUNTS_SUCCESS);
    assert_eq!(accounts.payload, r#"[{"id":"1"},{"id":"2"}]"#);
}

#[tokio::test]
async fn test_unknown_command_and_raw_emission() {
    let (config, mut events) = config_with(MockClient::new(), false);
    let service = BridgeService::new(config).unwrap();

    let err = service.invoke("getSessionFiles").wait().await.unwrap_err();
    assert_eq!(err.code(), "UnknownCommand");
    assert_eq!(next_event(&mut events).await.name, names::ON_ERROR);

    service.emit_event_with_name("hostPing", "{}").unwrap();
    assert_eq!(next_event(&mut events).await.name, "hostPing");

    assert!(matches!(
        service.emit_event_with_name("", "{}"),
        Err(ServiceError::Runtime(_))
    ));
}

#[tokio::test]
async fn test_shutdown_then_commands_report_not_initialized() {
    let mut client = MockClient::new();
    client.expect_initialize().returning(|_| Ok(()));
    let (config, mut events) = config_with(client, false);
    let service = BridgeService::new(config).unwrap();

    service.invoke("initSDK").wait().await.unwrap();
    service.shutdown();
    assert!(!service.reset_session());
    let _ = service.invoke("getSessionData").wait().await;

    assert_eq!(next_event(&mut events).await.name, names::ON_INITIALIZED);
    let error = next_event(&mut events).await;
    assert_eq!(error.name, names::ON_ERROR);
    assert_eq!(error.payload, r#"{"code":"NotInitialized"}"#);
}

#[tokio::test]
async fn test_filtered_session_data_through_service() {
    let mut client = MockClient::new();
    client.expect_initialize().returning(|_| Ok(()));
    client
        .expect_authorize()
        .returning(|| Ok(SessionGrant::new("abc123")));
    client.expect_fetch_session_data().returning(|_, deliveries| {
        for id in ["18_4_3_1_406_D201901_1", "18_4_5_1_406_D201901_2"] {
            deliveries
                .try_send(FileDelivery::File(SessionFile::new(id, "{}")))
                .unwrap();
        }
        Ok(())
    });
    let (config, mut events) = config_with(client, false);
    let service = BridgeService::new(config).unwrap();

    service.invoke("initSDK").wait().await.unwrap();
    service.invoke("authorize").wait().await.unwrap();
    service
        .get_session_data_filtered(FileFilter::default().with_service_ids([3]))
        .wait()
        .await
        .unwrap();

    assert_eq!(next_event(&mut events).await.name, names::ON_INITIALIZED);
    assert_eq!(next_event(&mut events).await.name, names::ON_AUTHORIZE_SUCCESS);
    let file = next_event(&mut events).await;
    assert_eq!(file.name, names::ON_FILE_RECEIVED);
    assert!(file.payload.contains("18_4_3_1_406_D201901_1"));
    let summary = next_event(&mut events).await;
    assert_eq!(summary.name, names::ON_SESSION_DATA_COMPLETE);
    assert_eq!(summary.payload, r#"{"filesReceived":1,"filesSkipped":1,"warnings":0}"#);
}

// The only test in this binary that installs the global subscriber.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_bootstrap_forwards_native_logs() {
    let mut client = MockClient::new();
    client.expect_initialize().returning(|_| Ok(()));
    let (config, mut events) = config_with(client, true);

    let logging = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Info);
    let service = bootstrap(config, logging).unwrap();
    service.invoke("initSDK").wait().await.unwrap();

    let mut saw_native_log = false;
    let mut saw_initialized = false;
    while !(saw_native_log && saw_initialized) {
        let event = next_event(&mut events).await;
        match event.name.as_str() {
            names::NATIVE_LOG => saw_native_log = true,
            names::ON_INITIALIZED => saw_initialized = true,
            _ => {}
        }
    }

    let (second, _events) = config_with(MockClient::new(), false);
    assert!(matches!(
        bootstrap(second, LoggingConfig::default()),
        Err(ServiceError::InitializationFailed(_))
    ));
}

//! Client warnings pass through the global log pipeline
//!
//! Installs the global subscriber with a capturing `LoggerSink`, so this
//! binary holds a single test.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{
    Account, ClientConfig, DeliverySender, EventSink, FileDelivery, LogEntry, LogLevel,
    LoggerSink, SessionClient, SessionFile, SessionGrant,
};
use core_bridge::BridgeModule;
use core_runtime::config::BridgeConfig;
use core_runtime::events::names;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

struct WarningClient;

#[async_trait]
impl SessionClient for WarningClient {
    async fn initialize(&self, _config: &ClientConfig) -> bridge_traits::error::Result<()> {
        Ok(())
    }

    async fn authorize(&self) -> bridge_traits::error::Result<SessionGrant> {
        Ok(SessionGrant::new("abc123"))
    }

    async fn list_session_accounts(
        &self,
        _session: &SessionGrant,
    ) -> bridge_traits::error::Result<Vec<Account>> {
        Ok(Vec::new())
    }

    async fn fetch_session_data(
        &self,
        _session: &SessionGrant,
        deliveries: DeliverySender,
    ) -> bridge_traits::error::Result<()> {
        let _ = deliveries
            .send(FileDelivery::Warning {
                file_id: None,
                message: "Ünable to reach user@host.com".to_string(),
            })
            .await;
        let _ = deliveries
            .send(FileDelivery::File(SessionFile::new(
                "18_4_0_1_406_D201901_1",
                "{}",
            )))
            .await;
        Ok(())
    }
}

#[derive(Default)]
struct CapturingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CapturingLogger {
    async fn log(&self, entry: LogEntry) -> bridge_traits::error::Result<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(String, String)>>,
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

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_warning_with_non_ascii_email_stays_non_terminal() -> anyhow::Result<()> {
    let logger = Arc::new(CapturingLogger::default());
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Warn)
            .with_logger_sink(logger.clone()),
    )?;

    let sink = Arc::new(RecordingSink::default());
    let config = BridgeConfig::builder()
        .session_client(Arc::new(WarningClient))
        .event_sink(sink.clone())
        .app_id("test-app")
        .contract_id("test-contract")
        .build()?;
    let module = BridgeModule::new(config)?;

    module.init_sdk().wait().await?;
    module.authorize().wait().await?;
    module.get_session_data().wait().await?;

    let events = sink.events.lock().unwrap().clone();
    let (name, payload) = events.last().cloned().unwrap_or_default();
    assert_eq!(name, names::ON_SESSION_DATA_COMPLETE);
    assert_eq!(payload, r#"{"filesReceived":1,"filesSkipped":0,"warnings":1}"#);

    let mut warning = None;
    for _ in 0..100 {
        warning = logger
            .entries
            .lock()
            .unwrap()
            .iter()
            .find_map(|entry| entry.fields.get("warning").cloned());
        if warning.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(warning.as_deref(), Some("Ü***@[REDACTED]"));
    Ok(())
}

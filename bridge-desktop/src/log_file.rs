//! Log File Sink using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    LogEntry, LogLevel, LoggerSink,
};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Appends log entries as JSON lines to a file.
///
/// The file and its parent directory are created on the first entry.
pub struct FileLogger {
    path: PathBuf,
    min_level: LogLevel,
    file: Mutex<Option<File>>,
}

impl FileLogger {
    /// Log to `bridge.log` under the platform data directory.
    pub fn new() -> Self {
        let dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("sdk-bridge")
            .join("logs");
        Self::with_path(dir.join("bridge.log"))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_level: LogLevel::Info,
            file: Mutex::new(None),
        }
    }

    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
                debug!(path = ?parent, "Created log directory");
            }
        }

        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?)
    }
}

impl Default for FileLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoggerSink for FileLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level < self.min_level {
            return Ok(());
        }

        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| BridgeError::OperationFailed(format!("encode log entry: {}", e)))?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(&line).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        if let Some(file) = self.file.lock().await.as_mut() {
            file.flush().await?;
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}

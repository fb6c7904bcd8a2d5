use bridge_traits::SessionFile;
use core_runtime::events::names;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;

/// Commands the host can invoke.
///
/// The set is closed; host-facing names are fixed at build time.
///
/// # Examples
///
/// ```
/// use core_bridge::Command;
///
/// let command: Command = "getSessionAccounts".parse().unwrap();
/// assert_eq!(command, Command::GetSessionAccounts);
/// assert_eq!(command.name(), "getSessionAccounts");
/// assert!("listFiles".parse::<Command>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    #[serde(rename = "initSDK")]
    InitSdk,
    #[serde(rename = "authorize")]
    Authorize,
    #[serde(rename = "getSessionAccounts")]
    GetSessionAccounts,
    #[serde(rename = "getSessionData")]
    GetSessionData,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::InitSdk,
        Command::Authorize,
        Command::GetSessionAccounts,
        Command::GetSessionData,
    ];

    /// Host-facing command name.
    pub fn name(&self) -> &'static str {
        match self {
            Command::InitSdk => "initSDK",
            Command::Authorize => "authorize",
            Command::GetSessionAccounts => "getSessionAccounts",
            Command::GetSessionData => "getSessionData",
        }
    }

    /// Event emitted when the command completes successfully.
    pub fn success_event(&self) -> &'static str {
        match self {
            Command::InitSdk => names::ON_INITIALIZED,
            Command::Authorize => names::ON_AUTHORIZE_SUCCESS,
            Command::GetSessionAccounts => names::ON_ACCOUNTS_SUCCESS,
            Command::GetSessionData => names::ON_SESSION_DATA_COMPLETE,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.name() == s)
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}

/// Last observed state of a command kind.
///
/// Only the most recent dispatch is tracked; a second dispatch while the
/// first is in flight simply moves the state back to `Dispatched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommandState {
    #[default]
    Idle,
    Dispatched,
    Succeeded,
    Failed,
}

impl CommandState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandState::Succeeded | CommandState::Failed)
    }
}

/// Payload of a `fileReceiveSuccess` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEnvelope {
    pub file_id: String,
    /// File content as a compact JSON string.
    pub json: String,
}

impl FileEnvelope {
    /// Wrap a delivered file, normalising its content to compact JSON.
    ///
    /// # Errors
    ///
    /// Fails when the file content is not valid JSON.
    pub fn from_file(file: &SessionFile) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_slice(&file.content)?;
        Ok(Self {
            file_id: file.identifier.clone(),
            json: serde_json::to_string(&value)?,
        })
    }

    /// Parse `json` back into a value.
    pub fn content(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.json)
    }
}

/// Payload of the `onSessionDataComplete` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDataSummary {
    pub files_received: usize,
    pub files_skipped: usize,
    pub warnings: usize,
}

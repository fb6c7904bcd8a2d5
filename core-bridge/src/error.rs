use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single command.
///
/// Every variant maps to the `code` field of the `onError` payload the host
/// receives; see [`CommandError::code`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("SDK client is not initialized")]
    NotInitialized,

    #[error("No active session")]
    NotAuthorized,

    #[error("External client error: {0}")]
    ExternalClient(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The host sink refused the command's success event.
    #[error("Event delivery failed: {0}")]
    EventDelivery(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl CommandError {
    /// Stable error code reported to the host.
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::NotInitialized => "NotInitialized",
            CommandError::NotAuthorized => "NotAuthorized",
            CommandError::ExternalClient(_) => "ExternalClientError",
            CommandError::Serialization(_) => "SerializationError",
            CommandError::EventDelivery(_) => "EventDeliveryFailed",
            CommandError::UnknownCommand(_) => "UnknownCommand",
        }
    }

    /// Human-readable detail, absent for precondition failures.
    pub fn message(&self) -> Option<&str> {
        match self {
            CommandError::NotInitialized | CommandError::NotAuthorized => None,
            CommandError::ExternalClient(message)
            | CommandError::Serialization(message)
            | CommandError::EventDelivery(message)
            | CommandError::UnknownCommand(message) => Some(message),
        }
    }

    /// Whether the failure came from calling a command out of order.
    pub fn is_precondition(&self) -> bool {
        matches!(self, CommandError::NotInitialized | CommandError::NotAuthorized)
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.message().map(str::to_string),
        }
    }

    /// JSON string carried by the `onError` event.
    pub fn to_payload_json(&self) -> String {
        serde_json::to_string(&self.to_payload())
            .unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", self.code()))
    }
}

impl From<BridgeError> for CommandError {
    fn from(err: BridgeError) -> Self {
        CommandError::ExternalClient(err.to_string())
    }
}

impl From<core_runtime::Error> for CommandError {
    fn from(err: core_runtime::Error) -> Self {
        CommandError::EventDelivery(err.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::Serialization(err.to_string())
    }
}

/// Payload of the `onError` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type Result<T> = std::result::Result<T, CommandError>;

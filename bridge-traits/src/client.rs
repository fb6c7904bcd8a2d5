//! External Session Client
//!
//! Contract for the privately-owned SDK that performs user authorization and
//! personal-data retrieval. The bridge never looks inside it: network calls,
//! encryption and consent UI all stay behind this trait.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

/// Contract credentials handed to the client during initialization.
#[derive(Clone, PartialEq, Eq)]
pub struct ContractCredentials {
    /// Application identifier issued by the data provider
    pub app_id: String,
    /// Contract identifier the user consents to
    pub contract_id: String,
    /// Location of the PKCS#12 bundle holding the contract private key
    pub private_key_path: Option<PathBuf>,
    /// Passphrase unlocking the key bundle
    pub passphrase: Option<String>,
}

impl ContractCredentials {
    pub fn new(app_id: impl Into<String>, contract_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            contract_id: contract_id.into(),
            private_key_path: None,
            passphrase: None,
        }
    }

    pub fn with_private_key(
        mut self,
        path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.private_key_path = Some(path.into());
        self.passphrase = Some(passphrase.into());
        self
    }
}

impl fmt::Debug for ContractCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractCredentials")
            .field("app_id", &self.app_id)
            .field("contract_id", &self.contract_id)
            .field("private_key_path", &self.private_key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Everything the client needs for one-time setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub credentials: ContractCredentials,
    /// Ask the client to produce verbose diagnostics
    pub debug_log_enabled: bool,
    /// Allow the client's guest (no account) consent flow
    pub guest_enabled: bool,
}

impl ClientConfig {
    pub fn new(credentials: ContractCredentials) -> Self {
        Self {
            credentials,
            debug_log_enabled: false,
            guest_enabled: false,
        }
    }
}

/// Authorized session returned by [`SessionClient::authorize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    /// Opaque session identifier
    pub session_id: String,
    /// When the session stops being usable, if the client reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionGrant {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the session has an expiry that lies before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// One account linked to an authorized session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<u32>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            service_id: None,
        }
    }
}

/// A single data file produced while fetching session data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    /// Client-assigned file identifier
    pub identifier: String,
    /// Decrypted file content
    pub content: Vec<u8>,
}

impl SessionFile {
    pub fn new(identifier: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            identifier: identifier.into(),
            content: content.into(),
        }
    }

    /// Parse the content as JSON, returning `None` when it is not valid JSON.
    pub fn content_as_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.content).ok()
    }
}

/// Item pushed by the client while a session data fetch is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDelivery {
    /// A file was received.
    File(SessionFile),
    /// A non-fatal problem with one file; the fetch keeps going.
    Warning {
        file_id: Option<String>,
        message: String,
    },
}

/// Sender half handed to [`SessionClient::fetch_session_data`].
pub type DeliverySender = mpsc::Sender<FileDelivery>;

/// External SDK client trait
///
/// Every operation is asynchronous and fallible. Failures are reported as
/// [`BridgeError`](crate::error::BridgeError) values whose description the
/// bridge passes through to the host unchanged.
///
/// # Session data streaming
///
/// `fetch_session_data` receives a bounded sender. The client pushes one
/// [`FileDelivery`] per received file (or per-file warning) in production
/// order and resolves once the whole fetch has finished. The bridge drains
/// the channel concurrently, so a full channel only applies backpressure.
/// Dropping every clone of the sender marks the end of the deliveries.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::client::{FileDelivery, SessionClient, SessionFile};
///
/// async fn fetch(client: &dyn SessionClient, grant: &SessionGrant) {
///     let (tx, mut rx) = tokio::sync::mpsc::channel(16);
///     let fetch = client.fetch_session_data(grant, tx);
///     // drain `rx` while `fetch` runs
/// }
/// ```
#[async_trait::async_trait]
pub trait SessionClient: Send + Sync {
    /// One-time setup. Calling it again must not corrupt client state.
    async fn initialize(&self, config: &ClientConfig) -> Result<()>;

    /// Run the authorization flow, which may involve user interaction.
    async fn authorize(&self) -> Result<SessionGrant>;

    /// List the accounts available to an authorized session.
    async fn list_session_accounts(&self, session: &SessionGrant) -> Result<Vec<Account>>;

    /// Stream the session's data files into `deliveries`.
    async fn fetch_session_data(
        &self,
        session: &SessionGrant,
        deliveries: DeliverySender,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_grant_serialization() {
        let grant = SessionGrant::new("abc123");
        let json = serde_json::to_string(&grant).unwrap();
        assert_eq!(json, r#"{"sessionId":"abc123"}"#);

        let expiry = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let grant = SessionGrant::new("abc123").with_expiry(expiry);
        let json = serde_json::to_string(&grant).unwrap();
        assert!(json.contains("expiresAt"));
    }

    #[test]
    fn test_session_grant_expiry() {
        let expiry = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let grant = SessionGrant::new("s").with_expiry(expiry);

        assert!(!grant.is_expired_at(Utc.with_ymd_and_hms(2029, 12, 31, 0, 0, 0).unwrap()));
        assert!(grant.is_expired_at(expiry));
        assert!(!SessionGrant::new("s").is_expired_at(expiry));
    }

    #[test]
    fn test_account_serialization_skips_missing_fields() {
        let accounts = vec![Account::new("1")];
        let json = serde_json::to_string(&accounts).unwrap();
        assert_eq!(json, r#"[{"id":"1"}]"#);

        let account = Account {
            id: "2".to_string(),
            name: Some("Spotify".to_string()),
            service_id: Some(19),
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(json.contains(r#""serviceId":19"#));
    }

    #[test]
    fn test_session_file_json_content() {
        let file = SessionFile::new("file-1", br#"[{"a":1}]"#.to_vec());
        let value = file.content_as_json().unwrap();
        assert!(value.is_array());

        let broken = SessionFile::new("file-2", b"not json".to_vec());
        assert!(broken.content_as_json().is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_passphrase() {
        let creds = ContractCredentials::new("app", "contract")
            .with_private_key("/keys/contract.p12", "hunter2");
        let debug = format!("{:?}", creds);

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("contract.p12"));
    }
}

use bridge_traits::SessionGrant;
use chrono::{DateTime, Utc};

use crate::error::{CommandError, Result};

/// Lifecycle of the external client as seen by the bridge.
///
/// ```text
/// Uninitialized ──initSDK──> Initialized ──authorize──> Authorized(grant)
///       ^                        ^                            │
///       │                        └─────── reset_session ──────┤
///       └──────────────────────── shutdown ───────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initialized,
    Authorized(SessionGrant),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initialized => "initialized",
            SessionState::Authorized(_) => "authorized",
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, SessionState::Uninitialized)
    }

    pub fn session(&self) -> Option<&SessionGrant> {
        match self {
            SessionState::Authorized(grant) => Some(grant),
            _ => None,
        }
    }

    pub fn require_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(CommandError::NotInitialized)
        }
    }

    /// Grant of the active session, if it has not expired at `now`.
    pub fn require_session(&self, now: DateTime<Utc>) -> Result<SessionGrant> {
        match self {
            SessionState::Uninitialized => Err(CommandError::NotInitialized),
            SessionState::Initialized => Err(CommandError::NotAuthorized),
            SessionState::Authorized(grant) if grant.is_expired_at(now) => {
                Err(CommandError::NotAuthorized)
            }
            SessionState::Authorized(grant) => Ok(grant.clone()),
        }
    }

    /// Record a successful `initSDK`. An existing session survives.
    pub fn mark_initialized(&mut self) {
        if !self.is_initialized() {
            *self = SessionState::Initialized;
        }
    }

    /// Record a successful `authorize`, replacing any previous session.
    ///
    /// Fails if the module was shut down while authorization was running.
    pub fn authorize(&mut self, grant: SessionGrant) -> Result<()> {
        self.require_initialized()?;
        *self = SessionState::Authorized(grant);
        Ok(())
    }

    /// Drop the active session, keeping the client initialized.
    pub fn reset_session(&mut self) -> Option<SessionGrant> {
        match std::mem::take(self) {
            SessionState::Authorized(grant) => {
                *self = SessionState::Initialized;
                Some(grant)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    pub fn shutdown(&mut self) {
        *self = SessionState::Uninitialized;
    }
}

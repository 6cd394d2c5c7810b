//! Session metadata and user data

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Authentication status of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Nothing is known yet (cold start, before restore or first call)
    #[default]
    Unknown,
    /// No valid session
    Unauthorized,
    /// Token present and the profile fetch succeeded
    Authorized,
    /// The API could not be reached
    Timeout,
}

impl SessionStatus {
    /// Status name as persisted
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Unauthorized => "unauthorized",
            Self::Authorized => "authorized",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token metadata of the current session
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Raw bearer token, without the scheme prefix
    pub token: Option<String>,
    /// Raw refresh token
    pub refresh_token: Option<String>,
    /// Absolute epoch seconds after which the token is stale
    pub expires_at: Option<u64>,
    /// Current authentication status
    #[serde(default)]
    pub status: SessionStatus,
}

impl SessionMetadata {
    /// Metadata of a signed-out session
    #[must_use]
    pub fn unauthorized() -> Self {
        Self {
            status: SessionStatus::Unauthorized,
            ..Self::default()
        }
    }

    /// Whether a bearer token is present
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Whether the token is past its expiry at `now` (epoch seconds).
    ///
    /// An unknown expiry counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_none_or(|expires_at| now >= expires_at)
    }

    /// Remaining lifetime at `now`, `None` when unknown
    #[must_use]
    pub fn remaining_at(&self, now: u64) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| Duration::from_secs(expires_at.saturating_sub(now)))
    }
}

// Tokens stay out of logs
impl std::fmt::Debug for SessionMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMetadata")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("status", &self.status)
            .finish()
    }
}

/// Profile of the signed-in user, as returned by the "current user" endpoint
pub type SessionData = serde_json::Map<String, serde_json::Value>;

/// Metadata together with its generation
///
/// The generation increases every time the metadata record is replaced
/// (save, soft save, clear, soft clear, restore), but not on status-only
/// updates. Observers use it to detect a new session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    /// Metadata at the time of the change
    pub metadata: SessionMetadata,
    /// Replacement counter
    pub generation: u64,
}

/// Current time in epoch seconds
#[must_use]
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

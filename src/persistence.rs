//! Durable storage of session metadata
//!
//! The [`PersistenceBridge`] is a write-through cache in front of a
//! [`PersistentStore`]: the store is read once when the session store is
//! created, and written after every metadata change. Records carry a
//! time-to-live equal to the remaining token lifetime so they expire along
//! with the token.
//!
//! Two stores ship with the crate:
//! - [`MemoryStore`] keeps the record in process (tests, short-lived tools)
//! - [`FileStore`] keeps it in a JSON file in the platform config directory
//!   (e.g. `~/.config/local-auth/` on Linux)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::StorageError;
use crate::types::{SessionMetadata, now_secs};

/// Durable backing for session metadata
pub trait PersistentStore: Send + Sync {
    /// Read the stored metadata, `None` when absent or expired
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be read
    fn read(&self) -> Result<Option<SessionMetadata>, StorageError>;

    /// Store metadata; it must not be returned by `read` after `ttl` elapses
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be written
    fn write(&self, value: &SessionMetadata, ttl: Option<Duration>) -> Result<(), StorageError>;

    /// Remove the stored metadata
    ///
    /// # Errors
    /// Returns error if the backing storage cannot be cleared
    fn clear(&self) -> Result<(), StorageError>;
}

/// Stored form of the metadata with its absolute expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRecord {
    metadata: SessionMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_until: Option<u64>,
}

impl PersistedRecord {
    fn new(metadata: &SessionMetadata, ttl: Option<Duration>) -> Self {
        Self {
            metadata: metadata.clone(),
            valid_until: ttl.map(|ttl| now_secs().saturating_add(ttl.as_secs())),
        }
    }

    fn is_expired(&self) -> bool {
        self.valid_until.is_some_and(|until| now_secs() >= until)
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-process store; honours TTLs like a cookie jar would
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<PersistedRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `metadata`
    #[must_use]
    pub fn with_metadata(metadata: &SessionMetadata, ttl: Option<Duration>) -> Self {
        Self {
            record: Mutex::new(Some(PersistedRecord::new(metadata, ttl))),
        }
    }
}

impl PersistentStore for MemoryStore {
    fn read(&self) -> Result<Option<SessionMetadata>, StorageError> {
        let mut record = self.record.lock().unwrap_or_else(PoisonError::into_inner);
        if record.as_ref().is_some_and(PersistedRecord::is_expired) {
            *record = None;
        }
        Ok(record.as_ref().map(|r| r.metadata.clone()))
    }

    fn write(&self, value: &SessionMetadata, ttl: Option<Duration>) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(PersistedRecord::new(value, ttl));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ============================================================================
// File Store
// ============================================================================

/// JSON file store for sessions that survive process restarts
#[derive(Debug, Clone)]
pub struct FileStore {
    storage_path: PathBuf,
}

impl FileStore {
    /// Store named after `prefix` in the platform config directory
    #[must_use]
    pub fn for_prefix(prefix: &str) -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("local-auth");

        Self {
            storage_path: config_dir.join(format!("{prefix}.json")),
        }
    }

    /// Store at a custom path
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { storage_path: path }
    }

    /// Get the storage path
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.storage_path
    }
}

impl PersistentStore for FileStore {
    fn read(&self) -> Result<Option<SessionMetadata>, StorageError> {
        if !self.storage_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.storage_path)?;
        let record: PersistedRecord = serde_json::from_str(&content)?;

        if record.is_expired() {
            tracing::debug!(path = %self.storage_path.display(), "Discarding expired session record");
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(record.metadata))
    }

    fn write(&self, value: &SessionMetadata, ttl: Option<Duration>) -> Result<(), StorageError> {
        if let Some(parent) = self.storage_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&PersistedRecord::new(value, ttl))?;
        std::fs::write(&self.storage_path, &content)?;

        // Tokens are credentials; keep them user-readable only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.storage_path, perms)?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        if self.storage_path.exists() {
            std::fs::remove_file(&self.storage_path)?;
        }
        Ok(())
    }
}

// ============================================================================
// Persistence Bridge
// ============================================================================

/// Keeps a [`PersistentStore`] in sync with the in-memory session metadata
#[derive(Clone)]
pub struct PersistenceBridge {
    store: Arc<dyn PersistentStore>,
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge").finish_non_exhaustive()
    }
}

impl PersistenceBridge {
    /// Bridge to `store`
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Read the prior session, if any. Read failures are logged and
    /// treated as "no prior session".
    #[must_use]
    pub fn restore(&self) -> Option<SessionMetadata> {
        match self.store.read() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted session");
                None
            }
        }
    }

    /// Write-through after a metadata change.
    ///
    /// Metadata without a token, or whose token already expired, clears the
    /// stored record. Failures are logged; the in-memory state stays
    /// authoritative.
    pub fn on_change(&self, metadata: &SessionMetadata) {
        let result = if metadata.has_token() {
            match metadata.remaining_at(now_secs()) {
                Some(Duration::ZERO) => self.store.clear(),
                ttl => self.store.write(metadata, ttl),
            }
        } else {
            self.store.clear()
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist session metadata");
        }
    }
}

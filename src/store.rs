//! In-memory session state
//!
//! [`SessionStore`] owns the session metadata (token, refresh token, expiry,
//! status) and the user's profile data. It is the only place either is
//! mutated. Every mutation:
//!
//! 1. happens under a single lock, so a save or clear is never observed
//!    half-applied,
//! 2. is written through to the [`PersistenceBridge`] if one is attached,
//! 3. is published to subscribers as a [`SessionSnapshot`].
//!
//! Steps 2 and 3 run before the lock is released, so the durable record and
//! the latest published snapshot always follow the order of mutations.
//!
//! The store is shared by reference (`Arc<SessionStore>`) between the auth
//! client, the route guard and the refresh scheduler.

use futures::Stream;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::error::FieldExtractionError;
use crate::path::{self, FieldPath};
use crate::persistence::PersistenceBridge;
use crate::types::{
    LocalAuthOptions, SessionData, SessionMetadata, SessionSnapshot, SessionStatus, TokenLifetime,
    now_secs,
};

#[derive(Debug, Default)]
struct StoreState {
    metadata: SessionMetadata,
    data: SessionData,
    generation: u64,
}

impl StoreState {
    fn replace_metadata(&mut self, metadata: SessionMetadata) {
        self.metadata = metadata;
        self.generation += 1;
    }

    fn clear(&mut self) {
        self.replace_metadata(SessionMetadata::unauthorized());
        self.data.clear();
    }

    fn soft_clear(&mut self) {
        let status = self.metadata.status;
        self.replace_metadata(SessionMetadata {
            status,
            ..SessionMetadata::default()
        });
    }
}

/// Token fields pulled out of a server response
struct ExtractedMeta {
    token: String,
    refresh_token: Option<String>,
    expires_at: u64,
}

/// Owner of the session metadata and user data
#[derive(Debug)]
pub struct SessionStore {
    options: Arc<LocalAuthOptions>,
    state: Mutex<StoreState>,
    changes: watch::Sender<SessionSnapshot>,
    bridge: Option<PersistenceBridge>,
}

impl SessionStore {
    /// Create a store with no durable backing
    #[must_use]
    pub fn new(options: Arc<LocalAuthOptions>) -> Self {
        Self::build(options, None)
    }

    /// Create a store backed by `bridge`, restoring any prior session.
    ///
    /// Restoring never touches the network; the restored metadata is taken
    /// as-is, including its status.
    #[must_use]
    pub fn with_persistence(options: Arc<LocalAuthOptions>, bridge: PersistenceBridge) -> Self {
        Self::build(options, Some(bridge))
    }

    fn build(options: Arc<LocalAuthOptions>, bridge: Option<PersistenceBridge>) -> Self {
        let mut state = StoreState::default();

        if let Some(restored) = bridge.as_ref().and_then(PersistenceBridge::restore) {
            tracing::debug!(status = %restored.status, "Restored persisted session");
            state.replace_metadata(restored);
        }

        let (changes, _) = watch::channel(SessionSnapshot {
            metadata: state.metadata.clone(),
            generation: state.generation,
        });

        Self {
            options,
            state: Mutex::new(state),
            changes,
            bridge,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a mutation, then persist and publish the result while still
    /// holding the lock
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);

        if let Some(bridge) = &self.bridge {
            bridge.on_change(&state.metadata);
        }
        self.changes.send_replace(SessionSnapshot {
            metadata: state.metadata.clone(),
            generation: state.generation,
        });
        result
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Options the store was created with
    #[must_use]
    pub fn options(&self) -> &LocalAuthOptions {
        &self.options
    }

    /// Copy of the current metadata
    #[must_use]
    pub fn metadata(&self) -> SessionMetadata {
        self.lock().metadata.clone()
    }

    /// Copy of the current user data
    #[must_use]
    pub fn data(&self) -> SessionData {
        self.lock().data.clone()
    }

    /// Current metadata together with its generation
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            metadata: state.metadata.clone(),
            generation: state.generation,
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock().metadata.status
    }

    /// Raw bearer token
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock().metadata.token.clone()
    }

    /// Raw refresh token
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.lock().metadata.refresh_token.clone()
    }

    /// Whether a bearer token is present
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.lock().metadata.has_token()
    }

    /// Whether the status is `Authorized`
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.status() == SessionStatus::Authorized
    }

    /// Metadata replacement counter
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// `Authorization` header value, e.g. `"Bearer abc"`
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.token().map(|token| {
            format!("{} {token}", self.options.token.token_type)
                .trim()
                .to_string()
        })
    }

    /// Receiver that observes every metadata change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.changes.subscribe()
    }

    /// Stream of snapshots, starting with the current one
    pub fn changes(&self) -> impl Stream<Item = SessionSnapshot> + Send + 'static {
        let mut rx = self.subscribe();
        async_stream::stream! {
            let current = rx.borrow_and_update().clone();
            yield current;
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                yield snapshot;
            }
        }
    }

    // ========================================================================
    // Metadata mutations
    // ========================================================================

    fn extract_meta(&self, response: &Value) -> Result<ExtractedMeta, FieldExtractionError> {
        let token = path::extract_string(response, &self.options.token.path, "token")?;

        let refresh_token = if self.options.refresh_token.enabled {
            Some(path::extract_string(
                response,
                &self.options.refresh_token.path,
                "refresh token",
            )?)
        } else {
            None
        };

        let expires_at = match &self.options.token.lifetime {
            TokenLifetime::Fixed(secs) => now_secs().saturating_add(*secs),
            TokenLifetime::Field(lifetime_path) => {
                path::extract_epoch_secs(response, lifetime_path, "token lifetime")?
            }
        };

        Ok(ExtractedMeta {
            token,
            refresh_token,
            expires_at,
        })
    }

    /// Replace the token fields with those found in `response`.
    ///
    /// With `meta_update_only` the current status is kept (soft clear before
    /// writing); otherwise the session is fully cleared first, leaving the
    /// status `Unauthorized` until a profile is saved.
    ///
    /// # Errors
    ///
    /// Returns `FieldExtractionError` if the token, the refresh token (when
    /// enabled) or the lifetime field is missing. The metadata is then left
    /// in its cleared state.
    pub fn save_meta(
        &self,
        response: &Value,
        meta_update_only: bool,
    ) -> Result<(), FieldExtractionError> {
        let extracted = self.extract_meta(response);

        self.mutate(|state| {
            if meta_update_only {
                state.soft_clear();
            } else {
                state.clear();
            }

            let extracted = extracted?;
            state.metadata.token = Some(extracted.token);
            state.metadata.refresh_token = extracted.refresh_token;
            state.metadata.expires_at = Some(extracted.expires_at);
            Ok(())
        })
        .inspect(|_| tracing::debug!(meta_update_only, "Saved session metadata"))
        .inspect_err(|e| tracing::debug!(error = %e, "Session metadata extraction failed"))
    }

    /// Store tokens delivered out of band (query parameters).
    ///
    /// The status is kept. The expiry is `now + lifetime` for a fixed
    /// lifetime and unknown when the lifetime is read from responses.
    pub fn soft_save_meta(&self, token: String, refresh_token: Option<String>) {
        let expires_at = match self.options.token.lifetime {
            TokenLifetime::Fixed(secs) => Some(now_secs().saturating_add(secs)),
            TokenLifetime::Field(_) => None,
        };

        self.mutate(|state| {
            let status = state.metadata.status;
            state.replace_metadata(SessionMetadata {
                token: Some(token),
                refresh_token,
                expires_at,
                status,
            });
        });
        tracing::debug!("Saved out-of-band session token");
    }

    /// Reset to a signed-out session and drop the user data
    pub fn clear_meta(&self) {
        self.mutate(StoreState::clear);
        tracing::debug!("Cleared session");
    }

    /// Drop the token fields but keep the status
    pub fn soft_clear_meta(&self) {
        self.mutate(StoreState::soft_clear);
    }

    /// Overwrite the status only
    pub fn set_status(&self, status: SessionStatus) {
        self.mutate(|state| state.metadata.status = status);
    }

    // ========================================================================
    // Session data mutations
    // ========================================================================

    /// Merge a profile response into the user data and mark the session
    /// `Authorized`. With `sessions.path` configured only that sub-object
    /// is merged.
    ///
    /// # Errors
    ///
    /// Returns `FieldExtractionError` if the configured sub-object is
    /// missing or is not an object.
    pub fn save_session(&self, response: &Value) -> Result<(), FieldExtractionError> {
        let root = FieldPath::root();
        let session_path = self.options.sessions.path.as_ref().unwrap_or(&root);

        let profile = match path::extract(response, session_path) {
            Some(Value::Object(map)) => map.clone(),
            // A bare scalar body has no fields to copy
            Some(_) if session_path.is_root() => SessionData::new(),
            _ => {
                return Err(FieldExtractionError::new(
                    "session data",
                    session_path.as_str(),
                ));
            }
        };

        self.mutate(|state| {
            state.data.extend(profile);
            state.metadata.status = SessionStatus::Authorized;
        });
        Ok(())
    }

    /// Mark the session `Unauthorized` and drop the user data; the token
    /// fields are left alone
    pub fn clear_session(&self) {
        self.mutate(|state| {
            state.metadata.status = SessionStatus::Unauthorized;
            state.data.clear();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::persistence::{MemoryStore, PersistentStore};
    use crate::types::{RefreshTokenOptions, SessionsOptions, TokenOptions};
    use serde_json::json;
    use std::time::Duration;

    fn store_with(options: LocalAuthOptions) -> SessionStore {
        SessionStore::new(Arc::new(options))
    }

    fn refresh_enabled() -> LocalAuthOptions {
        LocalAuthOptions::builder()
            .refresh_token(RefreshTokenOptions::builder().enabled(true).build())
            .build()
    }

    #[test]
    fn test_initial_state() {
        let store = store_with(LocalAuthOptions::default());
        assert_eq!(store.status(), SessionStatus::Unknown);
        assert!(store.token().is_none());
        assert!(store.data().is_empty());
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_clear_meta_is_idempotent() {
        let store = store_with(LocalAuthOptions::default());
        store.save_meta(&json!({"token": "T"}), false).unwrap();
        store.save_session(&json!({"name": "ann"})).unwrap();

        store.clear_meta();
        let once = store.metadata();
        store.clear_meta();

        assert_eq!(store.metadata(), once);
        assert_eq!(once, SessionMetadata::unauthorized());
        assert!(store.data().is_empty());
    }

    #[test]
    fn test_soft_clear_keeps_status() {
        let store = store_with(LocalAuthOptions::default());
        store.save_meta(&json!({"token": "T"}), false).unwrap();
        store.save_session(&json!({})).unwrap();
        assert_eq!(store.status(), SessionStatus::Authorized);

        store.soft_clear_meta();
        assert_eq!(store.status(), SessionStatus::Authorized);
        assert!(store.token().is_none());
        assert!(store.metadata().expires_at.is_none());

        store.clear_meta();
        assert_eq!(store.status(), SessionStatus::Unauthorized);
    }

    #[test]
    fn test_save_meta_fixed_lifetime() {
        let store = store_with(
            LocalAuthOptions::builder()
                .token(
                    TokenOptions::builder()
                        .lifetime(TokenLifetime::Fixed(3600))
                        .build(),
                )
                .build(),
        );

        let before = now_secs();
        store.save_meta(&json!({"token": "T"}), false).unwrap();
        let after = now_secs();

        let expires_at = store.metadata().expires_at.unwrap();
        assert!(expires_at >= before + 3600 && expires_at <= after + 3600);
        assert_eq!(store.token().as_deref(), Some("T"));
        // Full save resets status until a profile is stored
        assert_eq!(store.status(), SessionStatus::Unauthorized);
    }

    #[test]
    fn test_save_meta_lifetime_from_response() {
        let store = store_with(
            LocalAuthOptions::builder()
                .token(
                    TokenOptions::builder()
                        .path(FieldPath::parse("data/access").unwrap())
                        .lifetime(TokenLifetime::Field(FieldPath::parse("data/exp").unwrap()))
                        .build(),
                )
                .build(),
        );

        store
            .save_meta(&json!({"data": {"access": "A", "exp": 100}}), false)
            .unwrap();
        let meta = store.metadata();
        assert_eq!(meta.token.as_deref(), Some("A"));
        assert_eq!(meta.expires_at, Some(100));
        assert_eq!(meta.refresh_token, None);
    }

    #[test]
    fn test_save_meta_missing_token_leaves_cleared_state() {
        let store = store_with(LocalAuthOptions::default());
        store.save_meta(&json!({"token": "T"}), false).unwrap();

        let err = store.save_meta(&json!({"nope": 1}), false).unwrap_err();
        assert_eq!(err.field, "token");
        assert_eq!(store.metadata(), SessionMetadata::unauthorized());
    }

    #[test]
    fn test_save_meta_requires_refresh_token_when_enabled() {
        let store = store_with(refresh_enabled());
        store.save_session(&json!({})).unwrap();

        let err = store.save_meta(&json!({"token": "T"}), true).unwrap_err();
        assert_eq!(err.field, "refresh token");
        // Soft path: token fields gone, status kept
        assert!(store.token().is_none());
        assert_eq!(store.status(), SessionStatus::Authorized);

        store
            .save_meta(&json!({"token": "T", "refresh": "R"}), true)
            .unwrap();
        assert_eq!(store.refresh_token().as_deref(), Some("R"));
        assert_eq!(store.status(), SessionStatus::Authorized);
    }

    #[test]
    fn test_soft_save_meta_keeps_status() {
        let store = store_with(LocalAuthOptions::default());
        let before = now_secs();
        store.soft_save_meta("ABC".into(), None);

        let meta = store.metadata();
        assert_eq!(meta.token.as_deref(), Some("ABC"));
        assert_eq!(meta.status, SessionStatus::Unknown);
        assert!(meta.expires_at.unwrap() >= before + TokenOptions::DEFAULT_LIFETIME_SECS);
    }

    #[test]
    fn test_save_session_with_path() {
        let store = store_with(
            LocalAuthOptions::builder()
                .sessions(
                    SessionsOptions::builder()
                        .path(FieldPath::parse("user").unwrap())
                        .build(),
                )
                .build(),
        );

        store
            .save_session(&json!({"user": {"id": 7, "name": "ann"}, "meta": 1}))
            .unwrap();
        let data = store.data();
        assert_eq!(data.get("id"), Some(&json!(7)));
        assert!(data.get("meta").is_none());
        assert_eq!(store.status(), SessionStatus::Authorized);

        let err = store.save_session(&json!({"other": {}})).unwrap_err();
        assert_eq!(err.path, "user");
    }

    #[test]
    fn test_clear_session_keeps_token() {
        let store = store_with(LocalAuthOptions::default());
        store.save_meta(&json!({"token": "T"}), false).unwrap();
        store.save_session(&json!({"name": "ann"})).unwrap();

        store.clear_session();
        assert_eq!(store.status(), SessionStatus::Unauthorized);
        assert!(store.data().is_empty());
        assert_eq!(store.token().as_deref(), Some("T"));
    }

    #[test]
    fn test_authorization_header() {
        let store = store_with(LocalAuthOptions::default());
        assert!(store.authorization_header().is_none());

        store.soft_save_meta("abc".into(), None);
        assert_eq!(store.authorization_header().as_deref(), Some("Bearer abc"));

        let store = store_with(
            LocalAuthOptions::builder()
                .token(TokenOptions::builder().token_type("").build())
                .build(),
        );
        store.soft_save_meta("abc".into(), None);
        assert_eq!(store.authorization_header().as_deref(), Some("abc"));
    }

    #[test]
    fn test_generation_tracks_replacements_only() {
        let store = store_with(LocalAuthOptions::default());
        store.save_meta(&json!({"token": "T"}), false).unwrap();
        let generation = store.generation();

        store.save_session(&json!({})).unwrap();
        store.set_status(SessionStatus::Timeout);
        assert_eq!(store.generation(), generation);

        store.soft_clear_meta();
        assert_eq!(store.generation(), generation + 1);
    }

    #[test]
    fn test_persistence_restore_and_write_through() {
        let persisted = SessionMetadata {
            token: Some("old".into()),
            refresh_token: None,
            expires_at: Some(now_secs() + 600),
            status: SessionStatus::Authorized,
        };
        let backing = Arc::new(MemoryStore::with_metadata(&persisted, None));
        let store = SessionStore::with_persistence(
            Arc::new(LocalAuthOptions::default()),
            PersistenceBridge::new(backing.clone()),
        );

        assert_eq!(store.metadata(), persisted);

        store.clear_meta();
        assert!(backing.read().unwrap().is_none());

        store.save_meta(&json!({"token": "new"}), false).unwrap();
        assert_eq!(
            backing.read().unwrap().and_then(|m| m.token).as_deref(),
            Some("new")
        );
    }

    /// Backing store whose writes of token "A" take a while
    struct SlowStore {
        inner: MemoryStore,
    }

    impl PersistentStore for SlowStore {
        fn read(&self) -> Result<Option<SessionMetadata>, StorageError> {
            self.inner.read()
        }

        fn write(&self, value: &SessionMetadata, ttl: Option<Duration>) -> Result<(), StorageError> {
            if value.token.as_deref() == Some("A") {
                std::thread::sleep(Duration::from_millis(200));
            }
            self.inner.write(value, ttl)
        }

        fn clear(&self) -> Result<(), StorageError> {
            self.inner.clear()
        }
    }

    #[test]
    fn test_concurrent_mutations_persist_and_publish_in_order() {
        let backing = Arc::new(SlowStore {
            inner: MemoryStore::new(),
        });
        let store = Arc::new(SessionStore::with_persistence(
            Arc::new(LocalAuthOptions::default()),
            PersistenceBridge::new(backing.clone()),
        ));

        let saver = {
            let store = store.clone();
            std::thread::spawn(move || store.save_meta(&json!({"token": "A"}), false))
        };
        std::thread::sleep(Duration::from_millis(50));
        store.clear_meta();
        saver.join().unwrap().unwrap();

        // The clear came last, so nothing may survive in the durable store
        assert!(!store.has_token());
        assert!(backing.read().unwrap().is_none());

        let published = store.subscribe().borrow().clone();
        assert_eq!(published.generation, store.generation());
        assert!(!published.metadata.has_token());
    }

    #[test]
    fn test_huge_fixed_lifetime_saturates() {
        let store = store_with(
            LocalAuthOptions::builder()
                .token(
                    TokenOptions::builder()
                        .lifetime(TokenLifetime::Fixed(u64::MAX))
                        .build(),
                )
                .build(),
        );

        store.save_meta(&json!({"token": "T"}), false).unwrap();
        assert_eq!(store.metadata().expires_at, Some(u64::MAX));

        store.soft_save_meta("Q".into(), None);
        assert_eq!(store.metadata().expires_at, Some(u64::MAX));
        assert_eq!(store.token().as_deref(), Some("Q"));
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let store = store_with(LocalAuthOptions::default());
        let mut rx = store.subscribe();

        store.soft_save_meta("T".into(), None);
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.metadata.token.as_deref(), Some("T"));
        assert_eq!(snapshot.generation, 1);
    }

    #[tokio::test]
    async fn test_changes_stream_starts_with_current() {
        use futures::StreamExt;

        let store = store_with(LocalAuthOptions::default());
        let stream = store.changes();
        let mut stream = Box::pin(stream);

        let first = stream.next().await.unwrap();
        assert_eq!(first.generation, 0);

        store.clear_meta();
        let second = stream.next().await.unwrap();
        assert_eq!(second.metadata.status, SessionStatus::Unauthorized);
    }
}

//! `LocalAuthClient`: the token lifecycle operations
//!
//! The client ties the [`SessionStore`] to the two outside collaborators, an
//! [`HttpClient`] for the API and a [`Router`] for navigation, and exposes
//! the auth operations:
//!
//! | Operation | Effect |
//! |---|---|
//! | [`sign_in`](LocalAuthClient::sign_in) | exchange credentials, load the profile, navigate |
//! | [`sign_up`](LocalAuthClient::sign_up) | same against the sign-up endpoint |
//! | [`sign_out`](LocalAuthClient::sign_out) | best-effort server call, always clear and navigate |
//! | [`get_me`](LocalAuthClient::get_me) | silent refresh, then load the profile |
//! | [`refresh_token`](LocalAuthClient::refresh_token) | exchange the refresh token |
//! | [`refresh_token_with_check`](LocalAuthClient::refresh_token_with_check) | refresh only when the token is stale |
//! | [`check_and_save_query_auth`](LocalAuthClient::check_and_save_query_auth) | accept deep-link tokens |
//!
//! Server rejections (a status code is present) during `get_me` and
//! `refresh_token` force a sign-out. Network failures do not; the token may
//! still be valid and the caller can retry.
//!
//! # Example
//!
//! ```no_run
//! use local_auth::{LocalAuthClient, LocalAuthOptions};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = LocalAuthOptions::builder()
//!     .origin("https://api.example.com")
//!     .build();
//! let client = LocalAuthClient::builder(options).build()?;
//!
//! client
//!     .sign_in(&json!({"email": "me@example.com", "password": "secret"}), None)
//!     .await?;
//! println!("Signed in as {:?}", client.store().data().get("email"));
//!
//! client.sign_out(None).await?;
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{AuthError, AuthErrorCause, ConfigError, Operation, Result, TransportError};
use crate::guard::RouteGuard;
use crate::path;
use crate::persistence::{FileStore, PersistenceBridge, PersistentStore};
use crate::router::{HistoryRouter, Router};
use crate::scheduler::RefreshScheduler;
use crate::store::SessionStore;
use crate::transport::{HttpClient, HttpRequest, ReqwestClient};
use crate::types::{Endpoint, LocalAuthOptions, SessionStatus, now_secs};
use crate::utils::{absolute_route, join_url};

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`LocalAuthClient`]
///
/// Defaults: [`ReqwestClient`], a [`HistoryRouter`] at `/`, no persistence.
pub struct LocalAuthClientBuilder {
    options: LocalAuthOptions,
    http: Option<Arc<dyn HttpClient>>,
    router: Option<Arc<dyn Router>>,
    persistent_store: Option<Arc<dyn PersistentStore>>,
}

impl LocalAuthClientBuilder {
    /// Use a custom HTTP client
    #[must_use]
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Use a custom router
    #[must_use]
    pub fn router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    /// Persist session metadata to `store`
    #[must_use]
    pub fn persistent_store(mut self, store: Arc<dyn PersistentStore>) -> Self {
        self.persistent_store = Some(store);
        self
    }

    /// Persist session metadata to a [`FileStore`] named after
    /// `sessions.cookie_prefix`
    #[must_use]
    pub fn file_persistence(self) -> Self {
        let store = FileStore::for_prefix(&self.options.sessions.cookie_prefix);
        self.persistent_store(Arc::new(store))
    }

    /// Validate the options and build the client.
    ///
    /// A persistent store, if any, is read here; no network call is made.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the options are inconsistent.
    pub fn build(self) -> std::result::Result<LocalAuthClient, ConfigError> {
        self.options.validate()?;

        let options = Arc::new(self.options);
        let store = match self.persistent_store {
            Some(persistent) => {
                SessionStore::with_persistence(options, PersistenceBridge::new(persistent))
            }
            None => SessionStore::new(options),
        };

        Ok(LocalAuthClient {
            store: Arc::new(store),
            http: self
                .http
                .unwrap_or_else(|| Arc::new(ReqwestClient::new())),
            router: self
                .router
                .unwrap_or_else(|| Arc::new(HistoryRouter::new())),
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Auth operations over a shared [`SessionStore`]
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct LocalAuthClient {
    store: Arc<SessionStore>,
    http: Arc<dyn HttpClient>,
    router: Arc<dyn Router>,
}

impl std::fmt::Debug for LocalAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAuthClient")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl LocalAuthClient {
    /// Start building a client for `options`
    #[must_use]
    pub fn builder(options: LocalAuthOptions) -> LocalAuthClientBuilder {
        LocalAuthClientBuilder {
            options,
            http: None,
            router: None,
            persistent_store: None,
        }
    }

    /// Shared session state
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Router used for navigation
    #[must_use]
    pub fn router(&self) -> &Arc<dyn Router> {
        &self.router
    }

    /// Options the client was built with
    #[must_use]
    pub fn options(&self) -> &LocalAuthOptions {
        self.store.options()
    }

    /// Route guard over this client's session
    #[must_use]
    pub fn guard(&self) -> RouteGuard {
        RouteGuard::new(Arc::clone(&self.store))
    }

    /// Startup sequence: accept deep-link tokens, validate any existing
    /// token against the profile endpoint, then start periodic
    /// re-validation when `sessions.refresh_every` is set.
    ///
    /// Failures of the first two steps are logged and ignored. Must be
    /// called within a tokio runtime.
    pub async fn initialize(&self) -> Option<RefreshScheduler> {
        if self.options().token.query_key.is_some() {
            if let Err(e) = self.check_and_save_query_auth().await {
                tracing::warn!(error = %e, "Ignoring query auth failure");
            }
        }

        if self.store.has_token() {
            if let Err(e) = self.get_me().await {
                tracing::warn!(error = %e, "Startup profile fetch failed");
            }
        }

        self.options()
            .sessions
            .refresh_interval()
            .map(|interval| RefreshScheduler::start(self.clone(), interval))
    }

    // ========================================================================
    // Transport helper
    // ========================================================================

    /// Call `endpoint` on the configured origin.
    ///
    /// A failure without a status code (no response at all) marks the
    /// session `Timeout` and navigates to the down page when one is
    /// configured.
    async fn fetch(
        &self,
        endpoint: &Endpoint,
        body: Option<Value>,
        with_token: bool,
    ) -> std::result::Result<Value, TransportError> {
        let result = self.send(endpoint, body, with_token).await;

        if let Err(e) = &result {
            if !e.is_rejection() {
                if let Some(down_page) = &self.options().pages.server_is_down {
                    tracing::warn!(error = %e, "API unreachable, switching to down page");
                    self.store.set_status(SessionStatus::Timeout);
                    self.router.navigate(&absolute_route(down_page)).await;
                }
            }
        }

        result
    }

    /// Call `endpoint` without any down-page handling
    async fn send(
        &self,
        endpoint: &Endpoint,
        body: Option<Value>,
        with_token: bool,
    ) -> std::result::Result<Value, TransportError> {
        let url = join_url(&self.options().origin, &endpoint.path);
        let mut request = HttpRequest::new(endpoint.method, url);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        if with_token {
            if let Some(header) = self.store.authorization_header() {
                request = request.with_header("Authorization", header);
            }
        }

        self.http.request(request).await
    }

    /// Sign out after a server rejection; the caller reports its own error
    async fn force_sign_out(&self) {
        if let Err(e) = self.sign_out(None).await {
            tracing::warn!(error = %e, "Forced sign-out could not reach the server");
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Exchange credentials for a token, load the profile and navigate to
    /// `redirect` (default: `pages.default_redirect`).
    ///
    /// # Errors
    ///
    /// Returns `AuthError` carrying the transport error, a missing token
    /// field, or the nested `get_me` failure.
    pub async fn sign_in<C>(&self, credentials: &C, redirect: Option<&str>) -> Result<()>
    where
        C: Serialize + ?Sized + Sync,
    {
        let endpoint = self.options().endpoints.sign_in.clone();
        self.authenticate(Operation::SignIn, &endpoint, credentials, redirect)
            .await
    }

    /// Register and sign in in one step.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` with a `ConfigError` cause when no sign-up
    /// endpoint is configured; otherwise as [`sign_in`](Self::sign_in).
    pub async fn sign_up<C>(&self, credentials: &C, redirect: Option<&str>) -> Result<()>
    where
        C: Serialize + ?Sized + Sync,
    {
        let Some(endpoint) = self.options().endpoints.sign_up.clone() else {
            return Err(AuthError::new(
                Operation::SignUp,
                ConfigError::disabled("sign up", "Configure endpoints.signUp to enable it."),
            ));
        };
        self.authenticate(Operation::SignUp, &endpoint, credentials, redirect)
            .await
    }

    async fn authenticate<C>(
        &self,
        operation: Operation,
        endpoint: &Endpoint,
        credentials: &C,
        redirect: Option<&str>,
    ) -> Result<()>
    where
        C: Serialize + ?Sized + Sync,
    {
        let body = serde_json::to_value(credentials).map_err(|e| AuthError::new(operation, e))?;

        let response = self
            .fetch(endpoint, Some(body), false)
            .await
            .map_err(|e| AuthError::new(operation, e))?;

        self.store
            .save_meta(&response, false)
            .map_err(|e| AuthError::new(operation, e))?;

        self.get_me()
            .await
            .map_err(|e| AuthError::nested(operation, e))?;

        let target = redirect.unwrap_or(self.options().pages.default_redirect.as_str());
        self.router.navigate(target).await;

        tracing::info!(operation = %operation, "Authenticated");
        Ok(())
    }

    /// Sign out and navigate to `redirect` (default: `pages.auth`).
    ///
    /// The sign-out endpoint, when configured, is called with the current
    /// token. The local session is cleared and navigation happens even if
    /// that call fails. An unreachable server does not switch to the down
    /// page here; the auth page (or `redirect`) is the only destination.
    ///
    /// # Errors
    ///
    /// Returns the sign-out endpoint's transport error, after cleanup.
    pub async fn sign_out(&self, redirect: Option<&str>) -> Result<()> {
        let result = match &self.options().endpoints.sign_out {
            Some(endpoint) => self
                .send(endpoint, None, true)
                .await
                .map(|_| ())
                .map_err(|e| AuthError::new(Operation::SignOut, e)),
            None => Ok(()),
        };

        self.store.clear_meta();
        let target = redirect.unwrap_or(self.options().pages.auth.as_str());
        self.router.navigate(target).await;

        tracing::info!("Signed out");
        result
    }

    /// Load the current user's profile into the session data.
    ///
    /// A stale token is refreshed first; refresh failures are not returned
    /// from here.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when there is no token, or with the transport
    /// error. A server rejection signs the session out before returning.
    pub async fn get_me(&self) -> Result<()> {
        const OP: Operation = Operation::GetMe;

        if !self.store.has_token() {
            return Err(AuthError::message(OP, "token is null. sign in first"));
        }

        if let Err(e) = self.refresh_token_with_check().await {
            tracing::debug!(error = %e, "Silent refresh skipped");
        }

        // A rejected refresh has already signed the session out
        if !self.store.has_token() {
            return Err(AuthError::message(OP, "session expired. sign in again"));
        }

        let endpoint = &self.options().endpoints.get_me;
        let response = match self.fetch(endpoint, None, true).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_rejection() {
                    self.force_sign_out().await;
                }
                return Err(AuthError::new(OP, e));
            }
        };

        self.store.save_session(&response).map_err(|e| {
            self.store.clear_session();
            AuthError::new(OP, e)
        })
    }

    /// Exchange the refresh token for new token metadata, keeping the
    /// session status. Returns the response as saved.
    ///
    /// If the server omits the refresh token, the current one is kept.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` with a `ConfigError` cause when refresh is
    /// disabled (no request is made), when there is no refresh token, or
    /// when the exchange fails. A server rejection or a malformed response
    /// signs the session out before returning.
    ///
    /// A failure with no response at all (network error, timeout) leaves the
    /// session in place, unlike a rejection, so an outage does not discard
    /// credentials the server may still accept. The caller can retry once
    /// the API is reachable again.
    pub async fn refresh_token(&self) -> Result<Value> {
        const OP: Operation = Operation::RefreshToken;
        let options = self.options();

        if !options.refresh_token.enabled {
            return Err(AuthError::new(
                OP,
                ConfigError::disabled(
                    "refresh token",
                    "Enable it with refreshToken.enabled = true.",
                ),
            ));
        }
        let Some(current) = self.store.refresh_token() else {
            return Err(AuthError::message(OP, "refresh token is null. sign in first"));
        };

        let mut body = serde_json::Map::new();
        body.insert(
            options.refresh_token.body_key.clone(),
            Value::String(current.clone()),
        );

        let result: std::result::Result<Value, AuthErrorCause> = async {
            let mut response = self
                .fetch(&options.endpoints.refresh_token, Some(Value::Object(body)), false)
                .await?;
            path::insert_if_absent(
                &mut response,
                &options.refresh_token.path,
                Value::String(current),
            );
            self.store.save_meta(&response, true)?;
            Ok::<_, AuthErrorCause>(response)
        }
        .await;

        match result {
            Ok(response) => {
                tracing::debug!("Token refreshed");
                Ok(response)
            }
            Err(cause) => {
                let unreachable = matches!(&cause, AuthErrorCause::Transport(e) if !e.is_rejection());
                if !unreachable {
                    self.force_sign_out().await;
                }
                Err(AuthError::new(OP, cause))
            }
        }
    }

    /// Refresh only when refresh is enabled, the session is authorized and
    /// the token has expired.
    ///
    /// Returns `Ok(None)` without any request while the token is fresh.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` naming the unmet precondition, or wrapping the
    /// [`refresh_token`](Self::refresh_token) failure.
    pub async fn refresh_token_with_check(&self) -> Result<Option<Value>> {
        const OP: Operation = Operation::RefreshTokenWithCheck;
        let metadata = self.store.metadata();

        if !self.options().refresh_token.enabled {
            return Err(AuthError::message(OP, "refresh token is disabled"));
        }
        if metadata.status != SessionStatus::Authorized {
            return Err(AuthError::message(OP, "session is not found. sign in first"));
        }
        if metadata.refresh_token.is_none() {
            return Err(AuthError::message(OP, "refresh token is null. sign in first"));
        }
        if !metadata.is_expired_at(now_secs()) {
            tracing::debug!("Token still fresh, refresh skipped");
            return Ok(None);
        }

        self.refresh_token()
            .await
            .map(Some)
            .map_err(|e| AuthError::nested(OP, e))
    }

    /// Accept a token delivered in the current URL's query parameters.
    ///
    /// Reads `token.query_key` and, when refresh is enabled,
    /// `refresh_token.query_key`. Returns whether a token was found.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` with a `ConfigError` cause when no token query
    /// key is configured.
    pub async fn check_and_save_query_auth(&self) -> Result<bool> {
        let options = self.options();
        let Some(query_key) = &options.token.query_key else {
            return Err(AuthError::new(
                Operation::CheckAndSaveQueryAuth,
                ConfigError::disabled("query auth", "Configure token.queryKey to enable it."),
            ));
        };

        let mut params = self.router.current_query_params();
        let Some(token) = params.remove(query_key).filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        let refresh_token = if options.refresh_token.enabled {
            params
                .remove(&options.refresh_token.query_key)
                .filter(|t| !t.is_empty())
        } else {
            None
        };

        self.store.soft_save_meta(token, refresh_token);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Pages, RefreshTokenOptions};

    #[test]
    fn test_builder_validates_options() {
        let options = LocalAuthOptions::builder()
            .refresh_token(RefreshTokenOptions::builder().enabled(true).body_key("").build())
            .build();
        assert!(LocalAuthClient::builder(options).build().is_err());
    }

    #[test]
    fn test_builder_defaults() {
        let options = LocalAuthOptions::builder()
            .origin("http://localhost:3000")
            .pages(Pages::builder().auth("/sign-in").build())
            .build();
        let client = LocalAuthClient::builder(options).build().unwrap();

        assert_eq!(client.options().pages.auth, "/sign-in");
        assert_eq!(client.store().status(), SessionStatus::Unknown);
        assert_eq!(client.router().current_path(), "/");
    }

    #[tokio::test]
    async fn test_sign_up_disabled() {
        let client = LocalAuthClient::builder(LocalAuthOptions::default())
            .build()
            .unwrap();
        let err = client
            .sign_up(&serde_json::json!({"user": "a"}), None)
            .await
            .unwrap_err();

        assert_eq!(err.operation, Operation::SignUp);
        assert_eq!(err.kind(), crate::ErrorKind::Config);
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn test_get_me_without_token() {
        let client = LocalAuthClient::builder(LocalAuthOptions::default())
            .build()
            .unwrap();
        let err = client.get_me().await.unwrap_err();
        assert_eq!(err.to_string(), "get_me > token is null. sign in first");
    }
}

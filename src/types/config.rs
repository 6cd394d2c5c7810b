//! Configuration options for the session engine
//!
//! Options can be assembled with [`LocalAuthOptions::builder`] or loaded from
//! camelCase JSON. Every section has defaults, so a config only needs to
//! state what differs:
//!
//! ```
//! use local_auth::LocalAuthOptions;
//!
//! let options = LocalAuthOptions::from_json_str(r#"{
//!     "origin": "https://api.example.com",
//!     "token": { "path": "access", "lifetime": 3600 },
//!     "refreshToken": { "enabled": true }
//! }"#).unwrap();
//!
//! assert_eq!(options.token.token_type, "Bearer");
//! assert_eq!(options.pages.auth, "/login");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::error::ConfigError;
use crate::path::FieldPath;

// ============================================================================
// Endpoints
// ============================================================================

/// HTTP method of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
}

impl HttpMethod {
    /// Method name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote API endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Path relative to the origin
    pub path: String,
    /// HTTP method
    pub method: HttpMethod,
}

impl Endpoint {
    /// GET endpoint
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Get,
        }
    }

    /// POST endpoint
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Post,
        }
    }
}

/// Endpoints by role. `sign_up` and `sign_out` are optional; configuring them
/// enables the feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default, rename_all = "camelCase")]
pub struct Endpoints {
    /// Credentials exchange
    #[builder(default = Endpoint::post("auth/signIn"))]
    pub sign_in: Endpoint,
    /// Current user profile
    #[builder(default = Endpoint::get("users/me"))]
    pub get_me: Endpoint,
    /// Refresh token exchange
    #[builder(default = Endpoint::post("auth/refresh"))]
    pub refresh_token: Endpoint,
    /// Registration
    #[builder(default, setter(strip_option))]
    pub sign_up: Option<Endpoint>,
    /// Server-side session invalidation
    #[builder(default, setter(strip_option))]
    pub sign_out: Option<Endpoint>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::builder().build()
    }
}

// ============================================================================
// Token
// ============================================================================

/// How the token expiry is determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenLifetime {
    /// Token lives this many seconds from the moment it is saved
    Fixed(u64),
    /// Absolute epoch-seconds expiry read from this response field
    Field(FieldPath),
}

impl Default for TokenLifetime {
    fn default() -> Self {
        Self::Fixed(TokenOptions::DEFAULT_LIFETIME_SECS)
    }
}

/// Bearer token options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenOptions {
    /// Lifetime source
    #[builder(default)]
    pub lifetime: TokenLifetime,
    /// Where the token sits in the sign-in response (mandatory)
    #[builder(default = FieldPath::parse("token").unwrap_or_default())]
    pub path: FieldPath,
    /// Authorization scheme
    #[serde(rename = "type")]
    #[builder(default = "Bearer".to_string(), setter(into))]
    pub token_type: String,
    /// Query parameter carrying a deep-link token; enables query auth
    #[builder(default, setter(strip_option, into))]
    pub query_key: Option<String>,
}

impl TokenOptions {
    /// Default lifetime (one day)
    pub const DEFAULT_LIFETIME_SECS: u64 = 86_400;
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Refresh token options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshTokenOptions {
    /// Whether refresh tokens are issued and used
    #[builder(default)]
    pub enabled: bool,
    /// Where the refresh token sits in token responses
    #[builder(default = FieldPath::parse("refresh").unwrap_or_default())]
    pub path: FieldPath,
    /// Request body key used to send the refresh token
    #[builder(default = "refresh".to_string(), setter(into))]
    pub body_key: String,
    /// Query parameter carrying a deep-link refresh token
    #[builder(default = "refresh".to_string(), setter(into))]
    pub query_key: String,
}

impl Default for RefreshTokenOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

// ============================================================================
// Sessions & Pages
// ============================================================================

/// Session options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionsOptions {
    /// Sub-object of the profile response stored as session data
    #[builder(default, setter(strip_option))]
    pub path: Option<FieldPath>,
    /// Re-validation interval in milliseconds
    #[builder(default, setter(strip_option))]
    pub refresh_every: Option<u64>,
    /// Key of the durable session record
    #[builder(default = "localAuth".to_string(), setter(into))]
    pub cookie_prefix: String,
}

impl SessionsOptions {
    /// Re-validation interval as a `Duration`
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_every.map(Duration::from_millis)
    }
}

impl Default for SessionsOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Page routes used for redirects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(default, rename_all = "camelCase")]
pub struct Pages {
    /// Sign-in page
    #[builder(default = "/login".to_string(), setter(into))]
    pub auth: String,
    /// Landing page after sign-in
    #[builder(default = "/".to_string(), setter(into))]
    pub default_redirect: String,
    /// Page shown when the API is unreachable
    #[builder(default, setter(strip_option, into))]
    pub server_is_down: Option<String>,
    /// Guard every route unless it opts out
    #[builder(default)]
    pub protect_all_pages: bool,
    /// Abort navigation with a 504 instead of redirecting to the down page
    #[builder(default)]
    pub abort_when_down: bool,
}

impl Default for Pages {
    fn default() -> Self {
        Self::builder().build()
    }
}

// ============================================================================
// Local Auth Options
// ============================================================================

/// Complete, immutable configuration of the session engine
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TypedBuilder)]
#[serde(default, rename_all = "camelCase")]
#[builder(
    builder_method(doc = "Create a new builder for LocalAuthOptions"),
    builder_type(doc = "Builder for LocalAuthOptions", vis = "pub"),
    build_method(doc = "Build the LocalAuthOptions")
)]
pub struct LocalAuthOptions {
    /// Base URL of the API
    #[builder(default, setter(into))]
    pub origin: String,
    /// Session options
    #[builder(default)]
    pub sessions: SessionsOptions,
    /// Bearer token options
    #[builder(default)]
    pub token: TokenOptions,
    /// Refresh token options
    #[builder(default)]
    pub refresh_token: RefreshTokenOptions,
    /// Endpoints by role
    #[builder(default)]
    pub endpoints: Endpoints,
    /// Page routes
    #[builder(default)]
    pub pages: Pages,
}

impl LocalAuthOptions {
    /// Parse options from JSON, filling unspecified options with defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON or invalid field paths.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read options from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Check option combinations that deserialization alone cannot.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.path.is_root() {
            return Err(ConfigError::invalid("token.path must not be empty"));
        }
        if self.refresh_token.enabled {
            if self.refresh_token.path.is_root() {
                return Err(ConfigError::invalid(
                    "refreshToken.path must not be empty when refresh is enabled",
                ));
            }
            if self.refresh_token.body_key.is_empty() {
                return Err(ConfigError::invalid(
                    "refreshToken.bodyKey must not be empty when refresh is enabled",
                ));
            }
        }
        if self.sessions.refresh_every == Some(0) {
            return Err(ConfigError::invalid(
                "sessions.refreshEvery must be greater than zero",
            ));
        }
        if self.token.query_key.as_deref() == Some("") {
            return Err(ConfigError::invalid("token.queryKey must not be empty"));
        }
        Ok(())
    }
}

//! Error types for the local auth session engine

use std::fmt;

use thiserror::Error;

/// A mandatory field could not be located in a server response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error parsing {field}: nothing found at `{path}`")]
pub struct FieldExtractionError {
    /// Logical name of the field (e.g. `token`, `refresh token`)
    pub field: String,
    /// Configured field path that was looked up
    pub path: String,
}

impl FieldExtractionError {
    /// Create a field extraction error
    pub fn new(field: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            path: path.into(),
        }
    }
}

/// Failure reported by the HTTP collaborator
///
/// A present `status_code` means the server answered with a rejection; an
/// absent one means no response was received at all.
#[derive(Debug, Clone)]
pub struct TransportError {
    /// HTTP status code, if the server responded
    pub status_code: Option<u16>,
    /// Response body, if the server responded with one
    pub body: Option<serde_json::Value>,
    /// Human readable description
    pub message: String,
}

impl TransportError {
    /// Server responded with a non-success status
    pub fn rejected(status_code: u16, body: Option<serde_json::Value>) -> Self {
        Self {
            status_code: Some(status_code),
            body,
            message: format!("server responded with status {status_code}"),
        }
    }

    /// No response was received (connection refused, DNS, timeout...)
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            body: None,
            message: message.into(),
        }
    }

    /// Whether the server itself rejected the request
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        self.status_code.is_some()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status_code, &self.body) {
            (Some(status), Some(body)) => write!(f, "[{status}] > {body}"),
            (Some(status), None) => write!(f, "[{status}] > {}", self.message),
            (None, _) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field path string is malformed
    #[error("invalid field path `{path}`: {reason}")]
    InvalidFieldPath {
        /// The offending path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// An option has an unusable value
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A feature was invoked while its configuration is absent
    #[error("{feature} is disabled. {hint}")]
    FeatureDisabled {
        /// Feature name
        feature: &'static str,
        /// Which option enables it
        hint: &'static str,
    },

    /// Options JSON could not be parsed
    #[error("failed to parse options: {0}")]
    Parse(#[from] serde_json::Error),

    /// Options file could not be read
    #[error("failed to read options: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create an invalid configuration error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Create a disabled-feature error
    #[must_use]
    pub fn disabled(feature: &'static str, hint: &'static str) -> Self {
        Self::FeatureDisabled { feature, hint }
    }
}

/// Errors from a durable session store
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The auth operation an [`AuthError`] originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `sign_in`
    SignIn,
    /// `sign_up`
    SignUp,
    /// `sign_out`
    SignOut,
    /// `get_me`
    GetMe,
    /// `refresh_token`
    RefreshToken,
    /// `refresh_token_with_check`
    RefreshTokenWithCheck,
    /// `check_and_save_query_auth`
    CheckAndSaveQueryAuth,
}

impl Operation {
    /// Operation name as shown in error messages
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::SignUp => "sign_up",
            Self::SignOut => "sign_out",
            Self::GetMe => "get_me",
            Self::RefreshToken => "refresh_token",
            Self::RefreshTokenWithCheck => "refresh_token_with_check",
            Self::CheckAndSaveQueryAuth => "check_and_save_query_auth",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP or network failure
    Transport,
    /// Mandatory field missing from a response
    FieldExtraction,
    /// Feature disabled or misconfigured
    Config,
    /// Request payload could not be serialized
    Serialization,
    /// Operation precondition not met (no token, wrong status...)
    Precondition,
}

/// What caused an [`AuthError`]
#[derive(Debug, Error)]
pub enum AuthErrorCause {
    /// Transport collaborator failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Missing mandatory response field
    #[error(transparent)]
    FieldExtraction(#[from] FieldExtractionError),

    /// Missing or invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request payload serialization failure
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Failure of an operation called by this one
    #[error(transparent)]
    Nested(#[from] Box<AuthError>),

    /// Plain precondition message
    #[error("{0}")]
    Message(String),
}

/// Uniform error raised by every auth operation
#[derive(Debug, Error)]
#[error("{operation} > {cause}")]
pub struct AuthError {
    /// Operation that failed
    pub operation: Operation,
    /// Underlying cause
    #[source]
    pub cause: AuthErrorCause,
}

/// Result type alias for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Wrap a cause for the given operation
    pub fn new(operation: Operation, cause: impl Into<AuthErrorCause>) -> Self {
        Self {
            operation,
            cause: cause.into(),
        }
    }

    /// Create a precondition error with a plain message
    pub fn message(operation: Operation, msg: impl Into<String>) -> Self {
        Self::new(operation, AuthErrorCause::Message(msg.into()))
    }

    /// Re-wrap an error raised by a nested operation
    #[must_use]
    pub fn nested(operation: Operation, inner: AuthError) -> Self {
        Self::new(operation, Box::new(inner))
    }

    /// Innermost cause, looking through nested operation wrappers
    #[must_use]
    pub fn root_cause(&self) -> &AuthErrorCause {
        match &self.cause {
            AuthErrorCause::Nested(inner) => inner.root_cause(),
            cause => cause,
        }
    }

    /// Classification of the innermost cause
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.root_cause() {
            AuthErrorCause::Transport(_) => ErrorKind::Transport,
            AuthErrorCause::FieldExtraction(_) => ErrorKind::FieldExtraction,
            AuthErrorCause::Config(_) => ErrorKind::Config,
            AuthErrorCause::Json(_) => ErrorKind::Serialization,
            AuthErrorCause::Message(_) | AuthErrorCause::Nested(_) => ErrorKind::Precondition,
        }
    }

    /// Transport error at the root of this failure, if any
    #[must_use]
    pub fn transport(&self) -> Option<&TransportError> {
        match self.root_cause() {
            AuthErrorCause::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// HTTP status code reported by the server, if any
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.transport().and_then(|e| e.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let rejected =
            TransportError::rejected(401, Some(serde_json::json!({"detail": "bad token"})));
        assert_eq!(rejected.to_string(), r#"[401] > {"detail":"bad token"}"#);
        assert!(rejected.is_rejection());

        let network = TransportError::network("connection refused");
        assert_eq!(network.to_string(), "connection refused");
        assert!(!network.is_rejection());
    }

    #[test]
    fn test_auth_error_display_chains_operations() {
        let inner = AuthError::new(Operation::GetMe, TransportError::rejected(401, None));
        let outer = AuthError::nested(Operation::SignIn, inner);

        assert_eq!(
            outer.to_string(),
            "sign_in > get_me > [401] > server responded with status 401"
        );
        assert_eq!(outer.status_code(), Some(401));
        assert_eq!(outer.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_auth_error_kinds() {
        let err = AuthError::new(
            Operation::RefreshToken,
            ConfigError::disabled("refresh token", "Enable it in refreshToken/enabled"),
        );
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("disabled"));
        assert_eq!(err.status_code(), None);

        let err = AuthError::message(Operation::GetMe, "token is null");
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let err = AuthError::new(
            Operation::SignIn,
            FieldExtractionError::new("token", "data/token"),
        );
        assert_eq!(err.kind(), ErrorKind::FieldExtraction);
    }
}

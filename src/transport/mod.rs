//! Transport layer for talking to the remote API
//!
//! This module provides the [`HttpClient`] abstraction consumed by the auth
//! client and a reqwest-backed implementation, [`ReqwestClient`]. Tests and
//! embedders with their own HTTP stack implement the trait directly.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::types::HttpMethod;

/// A single JSON request to the API
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Absolute (or origin-relative) URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// JSON body, if any
    pub body: Option<Value>,
    /// Extra headers, e.g. `Authorization`
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// Create a request without body or headers
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            headers: Vec::new(),
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// HTTP collaborator used by every auth operation
///
/// Implementations return the decoded response body on success. A response
/// with a non-success status must become [`TransportError::rejected`]; a
/// failure to get any response must become [`TransportError::network`].
/// Timeouts and cancellation are the implementation's concern.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform `request`
    ///
    /// # Errors
    /// Returns `TransportError` on rejection or network failure
    async fn request(&self, request: HttpRequest) -> Result<Value, TransportError>;
}

pub use http::ReqwestClient;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::new(HttpMethod::Post, "http://api/auth")
            .with_body(json!({"user": "a"}))
            .with_header("Authorization", "Bearer t");

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, Some(json!({"user": "a"})));
        assert_eq!(request.header("authorization"), Some("Bearer t"));
        assert_eq!(request.header("x-missing"), None);
    }
}

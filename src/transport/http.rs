//! reqwest-backed [`HttpClient`]

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{HttpClient, HttpRequest};
use crate::error::TransportError;
use crate::types::HttpMethod;

/// Default HTTP client
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    http_client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client with reqwest's defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http_client })
    }

    /// Wrap an existing reqwest client
    #[must_use]
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

/// Decode a body as JSON, falling back to a JSON string for plain text
fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(&self, request: HttpRequest) -> Result<Value, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .http_client
            .request(method, &request.url)
            .header("Accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::trace!(method = %request.method, url = %request.url, "Sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        if status.is_success() {
            Ok(decode_body(text))
        } else {
            tracing::debug!(status = status.as_u16(), url = %request.url, "Request rejected");
            let body = decode_body(text);
            Err(TransportError::rejected(
                status.as_u16(),
                (!body.is_null()).then_some(body),
            ))
        }
    }
}

//! Navigation seam
//!
//! The auth client navigates after sign-in/sign-out and when the API is
//! down; the route guard reads the current path. [`HistoryRouter`] is an
//! in-memory implementation suited to CLIs and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Application router consumed by the auth client
#[async_trait]
pub trait Router: Send + Sync {
    /// Navigate to `path` (may include a query string)
    async fn navigate(&self, path: &str);

    /// Path of the current location, without query string
    fn current_path(&self) -> String;

    /// Query parameters of the current location
    fn current_query_params(&self) -> HashMap<String, String>;
}

/// In-memory router that records every navigation
#[derive(Debug)]
pub struct HistoryRouter {
    history: Mutex<Vec<String>>,
}

impl Default for HistoryRouter {
    fn default() -> Self {
        Self::with_location("/")
    }
}

impl HistoryRouter {
    /// Router positioned at `/`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Router positioned at `location`, e.g. `/welcome?token=abc`
    pub fn with_location(location: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![location.into()]),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every location visited, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Current location including its query string
    #[must_use]
    pub fn location(&self) -> String {
        self.lock().last().cloned().unwrap_or_else(|| "/".to_string())
    }

    fn parse_location(&self) -> Option<reqwest::Url> {
        let base = reqwest::Url::parse("http://localhost/").ok()?;
        base.join(&self.location()).ok()
    }
}

#[async_trait]
impl Router for HistoryRouter {
    async fn navigate(&self, path: &str) {
        tracing::debug!(path, "Navigating");
        self.lock().push(path.to_string());
    }

    fn current_path(&self) -> String {
        self.parse_location()
            .map_or_else(|| "/".to_string(), |url| url.path().to_string())
    }

    fn current_query_params(&self) -> HashMap<String, String> {
        self.parse_location()
            .map(|url| url.query_pairs().into_owned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_navigation_history() {
        let router = HistoryRouter::new();
        router.navigate("/login").await;
        router.navigate("/dashboard?tab=1").await;

        assert_eq!(router.history(), vec!["/", "/login", "/dashboard?tab=1"]);
        assert_eq!(router.current_path(), "/dashboard");
        assert_eq!(router.location(), "/dashboard?tab=1");
    }

    #[test]
    fn test_query_params() {
        let router = HistoryRouter::with_location("/welcome?token=ABC&refresh=R%201");
        let params = router.current_query_params();

        assert_eq!(params.get("token").map(String::as_str), Some("ABC"));
        assert_eq!(params.get("refresh").map(String::as_str), Some("R 1"));
        assert_eq!(router.current_path(), "/welcome");
    }

    #[test]
    fn test_no_query() {
        let router = HistoryRouter::with_location("/plain");
        assert!(router.current_query_params().is_empty());
    }
}

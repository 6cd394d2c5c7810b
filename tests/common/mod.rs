//! Shared fixtures: a scripted HTTP stub and client constructors

#![allow(dead_code)]

use async_trait::async_trait;
use local_auth::{
    HistoryRouter, HttpClient, HttpRequest, LocalAuthClient, LocalAuthOptions, TransportError,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const ORIGIN: &str = "http://api.test";

/// HTTP stub answering from per-path scripts and recording every request.
///
/// Responses for a path are consumed in order; the last one repeats.
/// Unscripted paths answer 404.
#[derive(Debug, Default)]
pub struct StubHttp {
    scripts: Mutex<HashMap<String, VecDeque<Result<Value, TransportError>>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StubHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response for `path` (relative to the origin, no leading `/`)
    pub fn on(&self, path: &str, response: Result<Value, TransportError>) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests sent to `path`
    pub fn calls(&self, path: &str) -> Vec<HttpRequest> {
        let url = format!("{ORIGIN}/{path}");
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }
}

#[async_trait]
impl HttpClient for StubHttp {
    async fn request(&self, request: HttpRequest) -> Result<Value, TransportError> {
        let path = request
            .url
            .strip_prefix(ORIGIN)
            .unwrap_or(&request.url)
            .trim_start_matches('/')
            .to_string();
        self.requests.lock().unwrap().push(request);

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => match queue.front().unwrap() {
                Ok(value) => Ok(value.clone()),
                Err(e) => Err(e.clone()),
            },
            None => Err(TransportError::rejected(404, None)),
        }
    }
}

pub struct Harness {
    pub client: LocalAuthClient,
    pub http: Arc<StubHttp>,
    pub router: Arc<HistoryRouter>,
}

pub fn harness(options: LocalAuthOptions) -> Harness {
    harness_at(options, "/")
}

/// Route library logs to the test output; `RUST_LOG=local_auth=debug` shows them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn harness_at(options: LocalAuthOptions, location: &str) -> Harness {
    init_tracing();
    let http = StubHttp::new();
    let router = Arc::new(HistoryRouter::with_location(location));
    let client = LocalAuthClient::builder(options)
        .http_client(http.clone())
        .router(router.clone())
        .build()
        .unwrap();
    Harness {
        client,
        http,
        router,
    }
}

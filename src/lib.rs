//! # local-auth
//!
//! Client-side session engine for APIs that issue bearer tokens.
//! Async/await, strong typing, tokio-based.
//!
//! The crate keeps a token, an optional refresh token and the signed-in
//! user's profile for one application, and drives them through sign-in,
//! profile validation, refresh and sign-out against a configurable JSON API.
//! A route guard turns the session status into navigation decisions.
//!
//! ## Quick Start
//!
//! ```no_run
//! use local_auth::{LocalAuthClient, LocalAuthOptions, RoutePolicy};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = LocalAuthOptions::from_json_str(
//!         r#"{
//!             "origin": "https://api.example.com",
//!             "token": { "path": "data/accessToken", "lifetime": "data/expiresAt" },
//!             "refreshToken": { "enabled": true, "path": "data/refreshToken" },
//!             "pages": { "protectAllPages": true, "serverIsDown": "/down" }
//!         }"#,
//!     )?;
//!
//!     let client = LocalAuthClient::builder(options)
//!         .file_persistence()
//!         .build()?;
//!     let _scheduler = client.initialize().await;
//!
//!     if !client.store().is_authorized() {
//!         client
//!             .sign_in(&json!({"email": "me@example.com", "password": "secret"}), None)
//!             .await?;
//!     }
//!
//!     let decision = client.guard().check("/settings", &RoutePolicy::Inherit);
//!     println!("{decision:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`store`]: [`SessionStore`], the single owner of session state
//! - [`persistence`]: write-through durable storage of the session metadata
//! - [`client`]: [`LocalAuthClient`], the auth operations
//! - [`guard`]: [`RouteGuard`], navigation decisions
//! - [`scheduler`]: [`RefreshScheduler`], periodic re-validation
//! - [`transport`]: the [`HttpClient`] seam and its reqwest implementation
//! - [`router`]: the [`Router`] seam and an in-memory history router
//! - [`path`]: slash-delimited field paths into JSON responses
//! - [`types`]: options, session records and route policies
//! - [`error`]: error types
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tokens are never logged. To see logs, attach a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! Every auth operation returns [`Result<T, AuthError>`](Result). The error
//! names the failed operation and its cause; [`AuthError::kind`] and
//! [`AuthError::status_code`] classify it:
//!
//! ```no_run
//! # use local_auth::{ErrorKind, LocalAuthClient};
//! # async fn example(client: LocalAuthClient) {
//! match client.get_me().await {
//!     Ok(()) => {}
//!     Err(e) if e.kind() == ErrorKind::Transport && e.status_code().is_none() => {
//!         eprintln!("API unreachable, retry later: {e}");
//!     }
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod guard;
pub mod path;
pub mod persistence;
pub mod router;
pub mod scheduler;
pub mod store;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use client::{LocalAuthClient, LocalAuthClientBuilder};
pub use error::{
    AuthError, AuthErrorCause, ConfigError, ErrorKind, FieldExtractionError, Operation, Result,
    StorageError, TransportError,
};
pub use guard::RouteGuard;
pub use path::FieldPath;
pub use persistence::{FileStore, MemoryStore, PersistenceBridge, PersistentStore};
pub use router::{HistoryRouter, Router};
pub use scheduler::RefreshScheduler;
pub use store::SessionStore;
pub use transport::{HttpClient, HttpRequest, ReqwestClient};
pub use types::{
    Endpoint, Endpoints, GuardDecision, HttpMethod, LocalAuthOptions, LocalAuthOptionsBuilder,
    Pages, RefreshTokenOptions, RoutePolicy, RouteRules, SessionData, SessionMetadata,
    SessionSnapshot, SessionStatus, SessionsOptions, TokenLifetime, TokenOptions,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

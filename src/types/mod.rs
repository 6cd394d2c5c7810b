//! Type definitions for the session engine
//!
//! This module contains the session state records, the configuration
//! options and the route policy types shared by the store, the client and
//! the route guard.

// Module declarations
pub mod config;
pub mod route;
pub mod session;

pub use config::{
    Endpoint, Endpoints, HttpMethod, LocalAuthOptions, LocalAuthOptionsBuilder, Pages,
    RefreshTokenOptions, SessionsOptions, TokenLifetime, TokenOptions,
};
pub use route::{GuardDecision, RoutePolicy, RouteRules};
pub use session::{SessionData, SessionMetadata, SessionSnapshot, SessionStatus, now_secs};

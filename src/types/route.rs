//! Per-route guard policy and guard outcomes

use serde::{Deserialize, Serialize};

/// Fine-grained rules for a guarded route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouteRules {
    /// Only reachable while signed out (login, sign-up pages)
    pub unauthorized_only: bool,
    /// Only reachable while signed in; others go to the default page
    pub authorized_only: bool,
}

/// Guard policy attached to a route
///
/// Deserializes from the same shapes a route meta block uses: omitted,
/// `true`/`false`, or `{ "unauthorizedOnly": true }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoutePolicy {
    /// No policy on the route; `protect_all_pages` decides
    #[default]
    Inherit,
    /// `true` guards with default rules, `false` disables the guard
    Enabled(bool),
    /// Guard with explicit rules
    Rules(RouteRules),
}

impl RoutePolicy {
    /// Only reachable while signed out
    #[must_use]
    pub fn unauthorized_only() -> Self {
        Self::Rules(RouteRules {
            unauthorized_only: true,
            authorized_only: false,
        })
    }

    /// Only reachable while signed in
    #[must_use]
    pub fn authorized_only() -> Self {
        Self::Rules(RouteRules {
            unauthorized_only: false,
            authorized_only: true,
        })
    }

    /// Rules to apply, or `None` when the route is unguarded
    #[must_use]
    pub fn resolve(&self, protect_all_pages: bool) -> Option<RouteRules> {
        match self {
            Self::Inherit if protect_all_pages => Some(RouteRules::default()),
            Self::Inherit | Self::Enabled(false) => None,
            Self::Enabled(true) => Some(RouteRules::default()),
            Self::Rules(rules) => Some(*rules),
        }
    }
}

impl From<bool> for RoutePolicy {
    fn from(enabled: bool) -> Self {
        Self::Enabled(enabled)
    }
}

impl From<RouteRules> for RoutePolicy {
    fn from(rules: RouteRules) -> Self {
        Self::Rules(rules)
    }
}

/// Outcome of a guard check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Proceed to the requested route
    Allow,
    /// Navigate here instead
    Redirect(String),
    /// Cancel navigation with an HTTP-like status
    Abort {
        /// Status code (504 when the API is down)
        status_code: u16,
        /// Reason shown to the user
        message: String,
    },
}

impl GuardDecision {
    /// Whether navigation may proceed unchanged
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

//! Route guard
//!
//! [`RouteGuard::check`] decides whether navigation to a route may proceed
//! given the session status and the route's [`RoutePolicy`]. The first
//! matching rule wins:
//!
//! 1. unguarded routes, and the down page itself, are allowed
//! 2. while the API is down the down page takes over (or navigation is
//!    aborted with a 504 when `pages.abort_when_down` is set)
//! 3. signed-in users are kept off `unauthorized_only` routes
//! 4. signed-out users are kept off `authorized_only` routes
//! 5. signed-out users are sent to the auth page
//!
//! Rules 3 and 4 redirect to the default page; rule 5 never fires on the
//! auth page itself so the login page stays reachable.

use std::sync::Arc;

use crate::store::SessionStore;
use crate::types::{GuardDecision, RoutePolicy, SessionStatus};
use crate::utils::{absolute_route, same_route};

/// Navigation guard over a shared session
#[derive(Debug, Clone)]
pub struct RouteGuard {
    store: Arc<SessionStore>,
}

impl RouteGuard {
    /// Guard decisions against `store`'s current status
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Decide navigation to `target` (a path, optionally with a query
    /// string) under `policy`.
    #[must_use]
    pub fn check(&self, target: &str, policy: &RoutePolicy) -> GuardDecision {
        let pages = &self.store.options().pages;
        let target = target.split(['?', '#']).next().unwrap_or_default();

        let Some(rules) = policy.resolve(pages.protect_all_pages) else {
            return GuardDecision::Allow;
        };
        if let Some(down_page) = &pages.server_is_down {
            if same_route(target, down_page) {
                return GuardDecision::Allow;
            }
        }

        let status = self.store.status();

        if status == SessionStatus::Timeout {
            if let Some(down_page) = &pages.server_is_down {
                return if pages.abort_when_down {
                    GuardDecision::Abort {
                        status_code: 504,
                        message: "server is down".to_string(),
                    }
                } else {
                    GuardDecision::Redirect(absolute_route(down_page))
                };
            }
        }

        let authorized = status == SessionStatus::Authorized;
        let on_default = same_route(target, &pages.default_redirect);

        if authorized && rules.unauthorized_only && !on_default {
            return GuardDecision::Redirect(absolute_route(&pages.default_redirect));
        }
        if !authorized && rules.authorized_only && !on_default {
            return GuardDecision::Redirect(absolute_route(&pages.default_redirect));
        }
        if !authorized && !rules.unauthorized_only && !same_route(target, &pages.auth) {
            return GuardDecision::Redirect(absolute_route(&pages.auth));
        }

        GuardDecision::Allow
    }
}

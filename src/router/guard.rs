//! Pre-navigation access control.
//!
//! Evaluated once before each page transition. The decision is pure in the
//! (route flags, session) pair, with one deliberate side effect: a stored
//! token that has expired is garbage-collected before the decision is made,
//! so stale state never lingers just because no request happened to fail.

use tracing::debug;

use crate::auth::session::SessionStore;
use crate::auth::token;

/// Access flags carried by a route descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    /// Only reachable with a live session.
    pub requires_auth: bool,
    /// Only reachable without one (login, register).
    pub guest_only: bool,
}

impl RouteMeta {
    pub fn requires_auth() -> Self {
        Self {
            requires_auth: true,
            guest_only: false,
        }
    }

    pub fn guest_only() -> Self {
        Self {
            requires_auth: false,
            guest_only: true,
        }
    }
}

/// What the navigation layer should do with the attempted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Go to the login page, carrying the originally intended destination so
    /// it can be resumed after a successful login.
    RedirectToLogin { redirect: String },
    /// Go to the default authenticated landing page.
    RedirectToHome,
}

/// Decide whether a transition to `target_path` (flags in `meta`) may
/// proceed, given the current session.
pub fn before_each(session: &SessionStore, target_path: &str, meta: &RouteMeta) -> RouteDecision {
    let stored = session.token();
    let token_valid = token::is_valid(stored.as_deref());

    if stored.is_some() && !token_valid {
        debug!("Stored token expired, clearing session");
        session.clear();
    }

    if meta.requires_auth && !token_valid {
        return RouteDecision::RedirectToLogin {
            redirect: target_path.to_string(),
        };
    }

    if meta.guest_only && token_valid {
        return RouteDecision::RedirectToHome;
    }

    RouteDecision::Allow
}

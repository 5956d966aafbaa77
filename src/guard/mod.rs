//! Client bootstrap guard.
//!
//! Client-rendered navigations never reach the request gate, so the client
//! re-checks the identity provider's live state itself. The guard trusts that
//! local state for responsiveness only; the request gate stays the authority
//! for anything rendered by the server.
//!
//! Flow Overview:
//! 1. [`AuthStore::init`] subscribes to the identity provider exactly once.
//! 2. Until the first callback arrives the guard is `Initializing` and
//!    protected routes render a neutral loading state ([`GuardView::Loading`]).
//! 3. Each callback resolves the guard. Signed out on a protected route
//!    produces one replace-navigation to sign-in; any signed-out callback also
//!    asks the server to clear both session cookies.
//! 4. The guard stays `Navigating` until the route actually changes.

mod client;
mod store;

use crate::session::routes::{is_protected_path, sign_in_location};

pub use client::HttpSessionClient;
pub use store::{AuthStore, IdentityProvider, Navigator, SessionClient};

/// What the client renders for the current route.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GuardView {
    /// Neutral placeholder; protected content must not be shown yet.
    Loading,
    Content,
    /// Replace-navigate to this location instead of rendering.
    Redirect(String),
}

/// Pure client-side decision over `(path, live auth state)`.
///
/// `query` is the location's search string, with or without its leading `?`.
#[must_use]
pub fn guard_decision(
    path: &str,
    query: Option<&str>,
    subject: Option<&str>,
    is_loading: bool,
) -> GuardView {
    if !is_protected_path(path) {
        return GuardView::Content;
    }
    if is_loading {
        return GuardView::Loading;
    }
    match subject {
        Some(_) => GuardView::Content,
        None => GuardView::Redirect(sign_in_location(path, query)),
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GuardPhase {
    Initializing,
    Resolved { subject: Option<String> },
    /// A redirect to `location` was issued from `from`; waiting for the route to change.
    Navigating { location: String, from: String },
}

/// Side effects the host must carry out after a guard transition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GuardEffect {
    ReplaceNavigation(String),
    /// Ask the server to delete both session cookies; failures are only logged.
    ClearServerSession,
}

/// Guard state machine for one page session.
#[derive(Debug)]
pub struct BootstrapGuard {
    phase: GuardPhase,
    subject: Option<String>,
    path: String,
    query: Option<String>,
}

impl BootstrapGuard {
    #[must_use]
    pub fn new(path: &str, query: Option<&str>) -> Self {
        Self {
            phase: GuardPhase::Initializing,
            subject: None,
            path: path.to_string(),
            query: query.map(str::to_string),
        }
    }

    #[must_use]
    pub fn phase(&self) -> &GuardPhase {
        &self.phase
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase == GuardPhase::Initializing
    }

    /// Identity provider callback with the current subject (`None` when signed out).
    pub fn on_auth_state(&mut self, subject: Option<String>) -> Vec<GuardEffect> {
        let mut effects = Vec::new();
        if subject.is_none() {
            effects.push(GuardEffect::ClearServerSession);
        }
        self.subject = subject;
        // A redirect already in flight is superseded only by the route changing.
        if !matches!(self.phase, GuardPhase::Navigating { .. }) {
            self.phase = GuardPhase::Resolved {
                subject: self.subject.clone(),
            };
            effects.extend(self.redirect_if_needed());
        }
        effects
    }

    /// The host's router reports a new location.
    pub fn on_route_change(&mut self, path: &str, query: Option<&str>) -> Vec<GuardEffect> {
        self.path = path.to_string();
        self.query = query.map(str::to_string);
        let waiting = match &self.phase {
            GuardPhase::Initializing => true,
            GuardPhase::Navigating { from, .. } => *from == self.path,
            GuardPhase::Resolved { .. } => false,
        };
        if waiting {
            return Vec::new();
        }
        self.phase = GuardPhase::Resolved {
            subject: self.subject.clone(),
        };
        self.redirect_if_needed().into_iter().collect()
    }

    #[must_use]
    pub fn view(&self) -> GuardView {
        if matches!(self.phase, GuardPhase::Navigating { .. }) && is_protected_path(&self.path) {
            return GuardView::Loading;
        }
        guard_decision(
            &self.path,
            self.query.as_deref(),
            self.subject.as_deref(),
            self.is_loading(),
        )
    }

    fn redirect_if_needed(&mut self) -> Option<GuardEffect> {
        match self.view() {
            GuardView::Redirect(location) => {
                self.phase = GuardPhase::Navigating {
                    location: location.clone(),
                    from: self.path.clone(),
                };
                Some(GuardEffect::ReplaceNavigation(location))
            }
            GuardView::Loading | GuardView::Content => None,
        }
    }
}

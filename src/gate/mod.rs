//! Edge request gate.
//!
//! Runs in front of every non-API response and picks one of three actions:
//! let the request through, bounce a signed-in visitor from `/` or `/signin`
//! to the dashboard, or send an anonymous visitor of a protected path to
//! sign-in (clearing both session cookies on the way).
//!
//! Flow Overview:
//! 1. Classify the path ([`classify`]). API and static paths are never gated.
//! 2. Only when the decision depends on it, work out whether the visitor is
//!    signed in: an honored dev marker short-circuits; no `__session` cookie
//!    means anonymous; otherwise the cookie header is forwarded to a
//!    [`SessionProbe`] exactly once, uncached.
//! 3. Map `(class, path, signed_in)` to a [`GateAction`] with [`decide`].
//!
//! The gate is infallible: probe errors count as "not signed in".

mod probe;

use axum::{
    extract::{Request, State},
    http::{header::COOKIE, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::session::{
    append_cleared_cookies, honors_dev_session,
    routes::{classify, redirects_when_signed_in, sign_in_location, PathClass, DASHBOARD_PATH},
    SessionConfig, SessionCookies, UnclassifiedPolicy,
};

pub use probe::{HttpSessionProbe, LocalSessionProbe, SessionProbe};

/// Outcome of gating one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GateAction {
    Allow,
    /// Signed-in visitor on `/` or `/signin`; the query string is dropped.
    RedirectToDashboard,
    /// Anonymous visitor on a gated path; both session cookies are cleared.
    RedirectToSignIn { location: String },
}

/// Decide what to do with a request, given whether its visitor is signed in.
#[must_use]
pub fn decide(
    class: PathClass,
    path: &str,
    query: Option<&str>,
    signed_in: bool,
    policy: UnclassifiedPolicy,
) -> GateAction {
    match class {
        PathClass::Api | PathClass::Asset => GateAction::Allow,
        PathClass::Public => {
            if signed_in && redirects_when_signed_in(path) {
                GateAction::RedirectToDashboard
            } else {
                GateAction::Allow
            }
        }
        PathClass::Protected => require_session(path, query, signed_in),
        PathClass::Unclassified => match policy {
            UnclassifiedPolicy::Allow => GateAction::Allow,
            UnclassifiedPolicy::Deny => require_session(path, query, signed_in),
        },
    }
}

fn require_session(path: &str, query: Option<&str>, signed_in: bool) -> GateAction {
    if signed_in {
        GateAction::Allow
    } else {
        GateAction::RedirectToSignIn {
            location: sign_in_location(path, query),
        }
    }
}

/// Whether [`decide`] can return something different for signed-in visitors.
fn depends_on_session(class: PathClass, path: &str, policy: UnclassifiedPolicy) -> bool {
    match class {
        PathClass::Api | PathClass::Asset => false,
        PathClass::Public => redirects_when_signed_in(path),
        PathClass::Protected => true,
        PathClass::Unclassified => policy == UnclassifiedPolicy::Deny,
    }
}

pub struct RequestGate {
    config: SessionConfig,
    probe: Arc<dyn SessionProbe>,
}

impl RequestGate {
    #[must_use]
    pub fn new(config: SessionConfig, probe: Arc<dyn SessionProbe>) -> Self {
        Self { config, probe }
    }

    /// Work out whether the request carries a session the verifier accepts.
    pub async fn is_signed_in(&self, headers: &HeaderMap) -> bool {
        let cookies = SessionCookies::from_headers(headers);
        if honors_dev_session(&self.config, &cookies) {
            return true;
        }
        if cookies.session.is_none() {
            return false;
        }
        self.probe.probe(&forwarded_cookie_header(headers)).await
    }

    pub async fn evaluate(&self, uri: &Uri, headers: &HeaderMap) -> GateAction {
        let path = uri.path();
        let class = classify(path);
        let policy = self.config.unclassified_policy();
        let signed_in = depends_on_session(class, path, policy) && self.is_signed_in(headers).await;
        decide(class, path, uri.query(), signed_in, policy)
    }

    fn redirect(&self, action: GateAction) -> Option<Response> {
        match action {
            GateAction::Allow => None,
            GateAction::RedirectToDashboard => {
                Some(Redirect::temporary(DASHBOARD_PATH).into_response())
            }
            GateAction::RedirectToSignIn { location } => {
                let mut response = Redirect::temporary(&location).into_response();
                append_cleared_cookies(response.headers_mut(), self.config.cookie_secure());
                Some(response)
            }
        }
    }
}

/// axum middleware running the gate in front of the wrapped routes.
pub async fn request_gate(
    State(gate): State<Arc<RequestGate>>,
    request: Request,
    next: Next,
) -> Response {
    let action = gate.evaluate(request.uri(), request.headers()).await;
    debug!(path = %request.uri().path(), ?action, "gate decision");
    match gate.redirect(action) {
        Some(response) => response,
        None => next.run(request).await,
    }
}

fn forwarded_cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ")
}

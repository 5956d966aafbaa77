//! Path classification and sign-in redirect targets.

use url::form_urlencoded;

pub const LANDING_PATH: &str = "/";
pub const SIGN_IN_PATH: &str = "/signin";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const API_PREFIX: &str = "/api";
/// The service's own liveness route.
pub const HEALTH_PATH: &str = "/health";

pub const PROTECTED_PREFIXES: [&str; 5] =
    ["/dashboard", "/goals", "/habits", "/tracker", "/profile"];
pub const PUBLIC_PREFIXES: [&str; 4] = [SIGN_IN_PATH, "/about", "/privacy", "/terms"];

const STATIC_PREFIX: &str = "/static/";
const FAVICON_PATH: &str = "/favicon.ico";
const NEXT_PARAM: &str = "next";

/// Where a request path falls for the purpose of gating.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathClass {
    /// Under `/api`, or the health route; handlers authorize themselves.
    Api,
    /// A static file; never gated.
    Asset,
    Public,
    Protected,
    /// Matches neither list.
    Unclassified,
}

#[must_use]
pub fn classify(path: &str) -> PathClass {
    if path.starts_with(API_PREFIX) || path == HEALTH_PATH {
        PathClass::Api
    } else if is_asset_path(path) {
        PathClass::Asset
    } else if is_public_path(path) {
        PathClass::Public
    } else if is_protected_path(path) {
        PathClass::Protected
    } else {
        PathClass::Unclassified
    }
}

#[must_use]
pub fn is_public_path(path: &str) -> bool {
    path == LANDING_PATH || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

#[must_use]
pub fn is_protected_path(path: &str) -> bool {
    PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// `/` and the sign-in page bounce signed-in visitors to the dashboard.
#[must_use]
pub fn redirects_when_signed_in(path: &str) -> bool {
    path == LANDING_PATH || path == SIGN_IN_PATH
}

fn is_asset_path(path: &str) -> bool {
    if path == FAVICON_PATH || path.starts_with(STATIC_PREFIX) {
        return true;
    }
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}

/// The path plus its query string, as the visitor requested it.
#[must_use]
pub fn original_target(path: &str, query: Option<&str>) -> String {
    match query
        .map(|q| q.strip_prefix('?').unwrap_or(q))
        .filter(|q| !q.is_empty())
    {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

/// Sign-in location that brings the visitor back to `path?query` afterwards.
#[must_use]
pub fn sign_in_location(path: &str, query: Option<&str>) -> String {
    let target = original_target(path, query);
    let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("{SIGN_IN_PATH}?{NEXT_PARAM}={encoded}")
}

/// Where to send a visitor after signing in, given the sign-in page's query.
///
/// Only same-origin absolute paths are honored; anything else lands on the
/// dashboard.
#[must_use]
pub fn post_sign_in_target(query: Option<&str>) -> String {
    let query = query.map_or("", |q| q.strip_prefix('?').unwrap_or(q));
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == NEXT_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|next| is_local_path(next))
        .unwrap_or_else(|| DASHBOARD_PATH.to_string())
}

fn is_local_path(candidate: &str) -> bool {
    candidate.starts_with('/') && !candidate.starts_with("//") && !candidate.contains('\\')
}

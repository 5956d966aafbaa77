//! Authenticated principal extraction for protected API handlers.
//!
//! Flow Overview: read the session cookies, resolve them through the session
//! manager, and return a principal downstream handlers can use.

use axum::http::{HeaderMap, StatusCode};
use tracing::error;

use crate::session::{SessionCookies, SessionManager, SessionMode};

/// Authenticated caller derived from the session cookies.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal {
    pub subject_id: String,
    pub mode: SessionMode,
}

/// Resolve the session cookies into a principal, or 401 when there is no valid session.
///
/// # Errors
///
/// `401` for missing, expired or invalid sessions; `500` when trust material
/// is missing, since that is an operator error rather than the caller's.
pub fn require_session(
    headers: &HeaderMap,
    sessions: &SessionManager,
) -> Result<Principal, StatusCode> {
    match sessions.verify(&SessionCookies::from_headers(headers)) {
        Ok(session) => Ok(Principal {
            subject_id: session.subject_id,
            mode: session.mode,
        }),
        Err(err) if err.is_configuration() => {
            error!("Failed to verify session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

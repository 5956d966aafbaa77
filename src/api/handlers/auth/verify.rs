use axum::{
    extract::Extension,
    http::{header::CACHE_CONTROL, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::SessionStatus;
use crate::session::{SessionCookies, SessionError, SessionManager};

#[utoipa::path(
    get,
    path = "/api/auth/verify",
    responses(
        (status = 200, description = "Session is valid", body = SessionStatus),
        (status = 401, description = "No valid session", body = SessionStatus),
        (status = 501, description = "Trust material missing", body = SessionStatus)
    ),
    tag = "auth"
)]
pub async fn verify(headers: HeaderMap, sessions: Extension<Arc<SessionManager>>) -> Response {
    let cookies = SessionCookies::from_headers(&headers);
    let (status, body) = match sessions.verify(&cookies) {
        Ok(session) => (
            StatusCode::OK,
            SessionStatus {
                uid: Some(session.subject_id),
                ..SessionStatus::ok().with_mode(session.mode)
            },
        ),
        Err(err) if err.is_configuration() => {
            warn!("Cannot verify session: {err}");
            (
                StatusCode::NOT_IMPLEMENTED,
                SessionStatus {
                    error: Some(err.code().to_string()),
                    code: Some(err.code().to_string()),
                    ..SessionStatus::default()
                },
            )
        }
        Err(err) => {
            // Expired, malformed and forged tokens look the same to the caller.
            if !matches!(err, SessionError::Missing) {
                debug!("Session rejected: {err}");
            }
            (StatusCode::UNAUTHORIZED, SessionStatus::default())
        }
    };

    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

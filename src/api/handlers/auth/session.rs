//! Session issuance and sign-out.

use axum::{
    body::Bytes,
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use super::{session_error_response, SessionStatus};
use crate::{
    api::handlers::{error_response, ErrorBody},
    session::{IssuedSession, SessionError, SessionManager},
};

/// Request body for `POST /api/auth/session`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    /// Bearer ID token minted by the identity provider.
    pub id_token: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/session",
    request_body = CreateSession,
    responses(
        (status = 200, description = "Session cookie set", body = SessionStatus),
        (status = 400, description = "Invalid body or ID token", body = ErrorBody),
        (status = 401, description = "Identity credential rejected", body = ErrorBody),
        (status = 403, description = "Dev bypass requested in production", body = ErrorBody),
        (status = 500, description = "Trust material missing in production", body = ErrorBody),
        (status = 501, description = "Dev bypass disabled", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn create_session(sessions: Extension<Arc<SessionManager>>, body: Bytes) -> Response {
    let config = sessions.config();
    if config.is_production() && !config.is_trust_configured() {
        error!("Session issuance requested in production without trust material");
        return session_error_response(&SessionError::NotConfigured);
    }

    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            ErrorBody::new("Invalid JSON body").with_code("INVALID_BODY"),
        );
    };

    let Some(id_token) = body.get("idToken").and_then(Value::as_str) else {
        return session_error_response(&SessionError::MalformedCredential);
    };
    if let Err(err) = sessions.check_credential(id_token) {
        return session_error_response(&err);
    }

    let issued = if config.is_trust_configured() {
        sessions.issue(id_token)
    } else {
        sessions.issue_dev()
    };

    match issued {
        Ok(IssuedSession { session, cookie }) => {
            debug!(mode = ?session.mode, "session created");
            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);
            (
                headers,
                Json(SessionStatus::ok().with_mode(session.mode)),
            )
                .into_response()
        }
        Err(err @ SessionError::DevSessionForbidden) => {
            warn!("Refusing dev session in production");
            session_error_response(&err)
        }
        Err(err) => {
            error!("Failed to create session: {err}");
            session_error_response(&err)
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Both session cookies cleared", body = SessionStatus)
    ),
    tag = "auth"
)]
pub async fn delete_session(sessions: Extension<Arc<SessionManager>>) -> Response {
    // Always clear, even when no session was presented.
    let mut headers = HeaderMap::new();
    match sessions.revoke() {
        Ok(cookies) => {
            for cookie in cookies {
                headers.append(SET_COOKIE, cookie);
            }
        }
        Err(err) => error!("Failed to build clearing cookies: {err}"),
    }
    (headers, Json(SessionStatus::ok())).into_response()
}


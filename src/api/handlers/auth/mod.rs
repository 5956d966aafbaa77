//! Session endpoints under `/api/auth`.
//!
//! Flow Overview:
//! - `POST /api/auth/session` exchanges an identity credential for the
//!   `__session` cookie (or the dev marker when running without trust material).
//! - `DELETE /api/auth/session` clears both cookies, always.
//! - `GET /api/auth/verify` is the gate's source of truth for a cookie header.
//!
//! Protected API handlers resolve the caller with [`principal::require_session`].

pub mod principal;
pub mod session;
pub mod verify;


use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{error_response, ErrorBody};
use crate::session::{SessionError, SessionMode};

/// Body of every successful (and of the unauthenticated) session response.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SessionStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SessionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl SessionStatus {
    pub(crate) fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Map a session error to its status and `{error, code}` body.
pub(crate) fn session_error_response(err: &SessionError) -> Response {
    let status = match err {
        SessionError::NotConfigured | SessionError::TrustMaterial(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        SessionError::DevSessionDisabled => StatusCode::NOT_IMPLEMENTED,
        SessionError::DevSessionForbidden => StatusCode::FORBIDDEN,
        SessionError::MalformedCredential => StatusCode::BAD_REQUEST,
        SessionError::CredentialRejected(_)
        | SessionError::Missing
        | SessionError::Expired
        | SessionError::InvalidToken => StatusCode::UNAUTHORIZED,
        SessionError::Signing(_) | SessionError::Cookie(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = match err {
        SessionError::CredentialRejected(_) => "Failed to create session".to_string(),
        other => other.to_string(),
    };
    error_response(status, ErrorBody::new(message).with_code(err.code()))
}

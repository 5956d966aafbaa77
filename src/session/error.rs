use axum::http::header::InvalidHeaderValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session cookies not configured (missing trust material)")]
    NotConfigured,
    #[error("invalid trust material: {0}")]
    TrustMaterial(String),
    #[error("dev session bypass disabled")]
    DevSessionDisabled,
    #[error("dev session bypass is not allowed in production")]
    DevSessionForbidden,
    #[error("invalid identity credential")]
    MalformedCredential,
    #[error("identity credential rejected: {0}")]
    CredentialRejected(String),
    #[error("missing session")]
    Missing,
    #[error("session expired")]
    Expired,
    #[error("invalid session token")]
    InvalidToken,
    #[error("failed to sign session token")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("invalid cookie value")]
    Cookie(#[from] InvalidHeaderValue),
}

impl SessionError {
    /// Stable code returned to API callers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured | Self::TrustMaterial(_) => "SESSION_NOT_CONFIGURED",
            Self::DevSessionDisabled => "DEV_SESSION_DISABLED",
            Self::DevSessionForbidden => "DEV_SESSION_FORBIDDEN",
            Self::MalformedCredential => "INVALID_ID_TOKEN",
            Self::CredentialRejected(_) | Self::Signing(_) | Self::Cookie(_) => {
                "SESSION_CREATE_FAILED"
            }
            Self::Missing | Self::Expired | Self::InvalidToken => "UNAUTHENTICATED",
        }
    }

    /// Operator misconfiguration rather than a caller problem.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::TrustMaterial(_))
    }
}

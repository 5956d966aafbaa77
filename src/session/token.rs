//! Signed session tokens stored in the `__session` cookie.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use utoipa::ToSchema;

use super::{SessionError, DEV_SUBJECT_ID, SESSION_TTL_SECONDS};

/// Clock skew tolerated on `iat` between the issuing and the verifying host.
const ISSUED_AT_LEEWAY_SECONDS: i64 = 60;

/// How a session came to exist.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Backed by a verified identity credential and a signed token.
    Verified,
    /// Development marker cookie; never honored in production.
    DevBypass,
}

/// A claim of identity bound to a time window. Never mutated; sign-in issues a new one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub subject_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub mode: SessionMode,
}

impl Session {
    pub(crate) fn dev(now: i64) -> Self {
        Self {
            subject_id: DEV_SUBJECT_ID.to_string(),
            issued_at: now,
            expires_at: now + SESSION_TTL_SECONDS,
            mode: SessionMode::DevBypass,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Sign a new session for `subject` valid from `now` for the fixed lifetime.
pub(crate) fn sign(
    key: &SecretString,
    subject: &str,
    now: i64,
) -> Result<(String, Session), SessionError> {
    let session = Session {
        subject_id: subject.to_string(),
        issued_at: now,
        expires_at: now + SESSION_TTL_SECONDS,
        mode: SessionMode::Verified,
    };
    let claims = SessionClaims {
        sub: session.subject_id.clone(),
        iat: session.issued_at,
        exp: session.expires_at,
        jti: Ulid::new().to_string(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(key.expose_secret().as_bytes()),
    )
    .map_err(SessionError::Signing)?;
    Ok((token, session))
}

/// Check signature and expiry of a session token at time `now`.
pub(crate) fn verify(key: &SecretString, token: &str, now: i64) -> Result<Session, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked against the caller's clock below, without leeway.
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(key.expose_secret().as_bytes()),
        &validation,
    )
    .map_err(|_| SessionError::InvalidToken)?;
    let claims = data.claims;

    if claims.exp <= now {
        return Err(SessionError::Expired);
    }
    if claims.sub.is_empty() || claims.iat > now + ISSUED_AT_LEEWAY_SECONDS {
        return Err(SessionError::InvalidToken);
    }

    Ok(Session {
        subject_id: claims.sub,
        issued_at: claims.iat,
        expires_at: claims.exp,
        mode: SessionMode::Verified,
    })
}

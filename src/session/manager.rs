//! Session issuance, verification and revocation.

use axum::http::HeaderValue;
use chrono::Utc;
use regex::Regex;
use tracing::debug;

use super::{
    cleared_cookies, dev_session_cookie, honors_dev_session, session_cookie, token, Session,
    SessionConfig, SessionCookies, SessionError, MIN_ID_TOKEN_LENGTH,
};

/// A new session together with the `Set-Cookie` value that delivers it.
#[derive(Debug)]
pub struct IssuedSession {
    pub session: Session,
    pub cookie: HeaderValue,
}

#[derive(Clone, Debug)]
pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Reject credentials that cannot be an identity token, before any verification.
    ///
    /// # Errors
    ///
    /// [`SessionError::MalformedCredential`] when the credential is too short
    /// or not three base64url segments.
    pub fn check_credential(&self, credential: &str) -> Result<(), SessionError> {
        check_credential_shape(credential)
    }

    /// Exchange a verified identity credential for a signed session.
    ///
    /// # Errors
    ///
    /// - [`SessionError::MalformedCredential`] before any verification when the
    ///   credential is too short or not token shaped,
    /// - [`SessionError::NotConfigured`] without trust material,
    /// - [`SessionError::CredentialRejected`] when the identity provider's
    ///   signature or claims do not check out.
    pub fn issue(&self, credential: &str) -> Result<IssuedSession, SessionError> {
        self.issue_at(credential, Utc::now().timestamp())
    }

    pub(crate) fn issue_at(
        &self,
        credential: &str,
        now: i64,
    ) -> Result<IssuedSession, SessionError> {
        check_credential_shape(credential)?;
        let trust = self
            .config
            .trust_material()
            .ok_or(SessionError::NotConfigured)?;
        let subject = trust.identity().verify(credential)?;
        let (token, session) = token::sign(trust.session_key(), &subject, now)?;
        let cookie = session_cookie(&token, self.config.cookie_secure())?;
        debug!(subject = %session.subject_id, "issued session");
        Ok(IssuedSession { session, cookie })
    }

    /// Issue the unsigned dev marker instead of a real session.
    ///
    /// # Errors
    ///
    /// [`SessionError::DevSessionForbidden`] in production regardless of the
    /// opt-in flag, [`SessionError::DevSessionDisabled`] when not opted in.
    pub fn issue_dev(&self) -> Result<IssuedSession, SessionError> {
        if self.config.is_production() {
            return Err(SessionError::DevSessionForbidden);
        }
        if !self.config.dev_session_enabled() {
            return Err(SessionError::DevSessionDisabled);
        }
        Ok(IssuedSession {
            session: Session::dev(Utc::now().timestamp()),
            cookie: dev_session_cookie()?,
        })
    }

    /// Resolve the presented cookies into a session.
    ///
    /// # Errors
    ///
    /// [`SessionError::Missing`], [`SessionError::Expired`] or
    /// [`SessionError::InvalidToken`] for sessions that do not verify;
    /// [`SessionError::NotConfigured`] when a token is presented but there is
    /// no trust material to check it with.
    pub fn verify(&self, cookies: &SessionCookies) -> Result<Session, SessionError> {
        self.verify_at(cookies, Utc::now().timestamp())
    }

    pub(crate) fn verify_at(
        &self,
        cookies: &SessionCookies,
        now: i64,
    ) -> Result<Session, SessionError> {
        if honors_dev_session(&self.config, cookies) {
            return Ok(Session::dev(now));
        }
        let token = cookies.session.as_deref().ok_or(SessionError::Missing)?;
        let trust = self
            .config
            .trust_material()
            .ok_or(SessionError::NotConfigured)?;
        token::verify(trust.session_key(), token, now)
    }

    /// Clearing values for both cookies; safe to send with or without a session.
    ///
    /// # Errors
    ///
    /// Infallible in practice; the values are fixed ASCII strings.
    pub fn revoke(&self) -> Result<[HeaderValue; 2], SessionError> {
        Ok(cleared_cookies(self.config.cookie_secure())?)
    }
}

fn check_credential_shape(credential: &str) -> Result<(), SessionError> {
    if credential.len() < MIN_ID_TOKEN_LENGTH {
        return Err(SessionError::MalformedCredential);
    }
    let token_shaped = Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$")
        .is_ok_and(|re| re.is_match(credential));
    if token_shaped {
        Ok(())
    } else {
        Err(SessionError::MalformedCredential)
    }
}

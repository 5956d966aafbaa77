//! Shared session configuration for the request gate and the session API.
//!
//! Cookie names, lifetimes and the public/protected path lists live here and
//! nowhere else; the gate, the `/api/auth` handlers and the client guard all
//! import them from this module.
//!
//! Flow Overview:
//! - `POST /api/auth/session` exchanges an identity credential for a signed
//!   `__session` token ([`SessionManager::issue`]), or sets the unsigned
//!   `__dev_session` marker when running without trust material in
//!   development ([`SessionManager::issue_dev`]).
//! - The gate and `GET /api/auth/verify` resolve cookies back into a
//!   [`Session`] ([`SessionManager::verify`]).
//! - Sign-out overwrites both cookies with an expired, empty value.
//!
//! Security boundaries: the dev marker is honored only by
//! [`honors_dev_session`], which re-checks the production flag on its own
//! before consulting [`SessionConfig::dev_session_enabled`].

mod cookies;
mod error;
mod identity;
mod manager;
pub mod routes;
mod token;

use secrecy::SecretString;
use std::{fmt, sync::Arc};
use tracing::warn;

pub use cookies::{
    append_cleared_cookies, cleared_cookies, dev_session_cookie, session_cookie, SessionCookies,
};
pub use error::SessionError;
pub use identity::{IdentityVerifier, JwtIdentityVerifier};
pub use manager::{IssuedSession, SessionManager};
pub use token::{Session, SessionMode};

#[cfg(test)]
pub(crate) use identity::test_support;

/// Cookie carrying the signed session token.
pub const SESSION_COOKIE_NAME: &str = "__session";
/// Cookie carrying the development bypass marker.
pub const DEV_SESSION_COOKIE_NAME: &str = "__dev_session";
/// The only value ever written to the dev marker cookie.
pub const DEV_SESSION_SENTINEL: &str = "1";
/// Subject reported for dev bypass sessions.
pub const DEV_SUBJECT_ID: &str = "dev";
/// Fixed session lifetime: 14 days.
pub const SESSION_TTL_SECONDS: i64 = 14 * 24 * 60 * 60;
/// Identity credentials shorter than this are rejected before any verification.
pub const MIN_ID_TOKEN_LENGTH: usize = 50;

/// Endpoint that validates the presented session cookies.
pub const VERIFY_PATH: &str = "/api/auth/verify";
/// Endpoint that issues (`POST`) and clears (`DELETE`) session cookies.
pub const SESSION_PATH: &str = "/api/auth/session";

/// What the gate does with a path that is neither public nor protected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum UnclassifiedPolicy {
    /// Let the request through without a session.
    #[default]
    Allow,
    /// Require a session, exactly like a protected path.
    Deny,
}

/// Keys needed to issue and verify real sessions.
pub struct TrustMaterial {
    session_key: SecretString,
    identity: Arc<dyn IdentityVerifier>,
}

impl TrustMaterial {
    #[must_use]
    pub fn new(session_key: SecretString, identity: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            session_key,
            identity,
        }
    }

    pub(crate) fn session_key(&self) -> &SecretString {
        &self.session_key
    }

    pub(crate) fn identity(&self) -> &dyn IdentityVerifier {
        self.identity.as_ref()
    }
}

impl fmt::Debug for TrustMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustMaterial")
            .field("session_key", &"***")
            .finish_non_exhaustive()
    }
}

/// Runtime configuration shared by every session-aware component.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    production: bool,
    allow_dev_session: bool,
    unclassified: UnclassifiedPolicy,
    trust: Option<Arc<TrustMaterial>>,
}

impl SessionConfig {
    #[must_use]
    pub fn new(production: bool) -> Self {
        Self {
            production,
            allow_dev_session: false,
            unclassified: UnclassifiedPolicy::default(),
            trust: None,
        }
    }

    #[must_use]
    pub fn with_dev_session(mut self, allow: bool) -> Self {
        self.allow_dev_session = allow;
        self
    }

    #[must_use]
    pub fn with_unclassified_policy(mut self, policy: UnclassifiedPolicy) -> Self {
        self.unclassified = policy;
        self
    }

    #[must_use]
    pub fn with_trust_material(mut self, trust: TrustMaterial) -> Self {
        self.trust = Some(Arc::new(trust));
        self
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Session cookies are `Secure` exactly when running in production.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.production
    }

    #[must_use]
    pub fn unclassified_policy(&self) -> UnclassifiedPolicy {
        self.unclassified
    }

    #[must_use]
    pub fn trust_material(&self) -> Option<&TrustMaterial> {
        self.trust.as_deref()
    }

    #[must_use]
    pub fn is_trust_configured(&self) -> bool {
        self.trust.is_some()
    }

    /// Whether the dev bypass opt-in is in effect.
    ///
    /// Always `false` in production, even when the opt-in flag is set.
    #[must_use]
    pub fn dev_session_enabled(&self) -> bool {
        if self.allow_dev_session && self.production {
            warn!("dev session bypass is enabled in production; ignoring it");
            return false;
        }
        self.allow_dev_session && !self.production
    }
}

/// Whether the presented cookies carry a dev bypass session that may be honored.
///
/// True only for (bypass opted in) AND (not production) AND (marker present).
#[must_use]
pub fn honors_dev_session(config: &SessionConfig, cookies: &SessionCookies) -> bool {
    if config.is_production() {
        return false;
    }
    config.dev_session_enabled() && cookies.dev_session.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookies(dev: bool) -> SessionCookies {
        SessionCookies {
            session: None,
            dev_session: dev.then(|| DEV_SESSION_SENTINEL.to_string()),
        }
    }

    #[test]
    fn dev_session_honored_only_when_all_three_conditions_hold() {
        for allow in [false, true] {
            for production in [false, true] {
                for present in [false, true] {
                    let config = SessionConfig::new(production).with_dev_session(allow);
                    let honored = honors_dev_session(&config, &cookies(present));
                    assert_eq!(
                        honored,
                        allow && !production && present,
                        "allow={allow} production={production} present={present}"
                    );
                }
            }
        }
    }

    #[test]
    fn production_disables_dev_session_opt_in() {
        let config = SessionConfig::new(true).with_dev_session(true);
        assert!(!config.dev_session_enabled());
        assert!(config.cookie_secure());
    }

    #[test]
    fn defaults_are_permissive_for_unclassified_and_untrusted() {
        let config = SessionConfig::new(false);
        assert_eq!(config.unclassified_policy(), UnclassifiedPolicy::Allow);
        assert!(!config.is_trust_configured());
        assert!(!config.cookie_secure());
    }

    #[test]
    fn trust_material_debug_hides_key() {
        let identity = JwtIdentityVerifier::from_secret(b"provider-secret");
        let trust = TrustMaterial::new(SecretString::from("very-secret"), Arc::new(identity));
        let rendered = format!("{trust:?}");
        assert!(!rendered.contains("very-secret"));
    }
}

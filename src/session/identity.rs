//! Verification of identity provider credentials (bearer ID tokens).

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::SessionError;

/// Turns a bearer ID token from the identity provider into a subject id.
pub trait IdentityVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SessionError::CredentialRejected`] when the credential is not
    /// acceptable (bad signature, expired, wrong issuer or audience, no subject).
    fn verify(&self, credential: &str) -> Result<String, SessionError>;
}

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: String,
}

/// JWT-based identity verifier (RS256 public key or HS256 shared secret).
pub struct JwtIdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityVerifier {
    /// Build a verifier from the provider's PEM encoded RSA public key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TrustMaterial`] if the PEM cannot be parsed.
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, SessionError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|err| SessionError::TrustMaterial(format!("identity public key: {err}")))?;
        Ok(Self::with_key(key, Algorithm::RS256))
    }

    /// Build a verifier for providers that sign with a shared secret.
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        // Audience is only checked when one is configured.
        validation.validate_aud = false;
        Self { key, validation }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }
}

impl IdentityVerifier for JwtIdentityVerifier {
    fn verify(&self, credential: &str) -> Result<String, SessionError> {
        let data = decode::<IdentityClaims>(credential, &self.key, &self.validation)
            .map_err(|err| SessionError::CredentialRejected(err.to_string()))?;
        let subject = data.claims.sub.trim();
        if subject.is_empty() {
            return Err(SessionError::CredentialRejected("empty subject".to_string()));
        }
        Ok(subject.to_string())
    }
}

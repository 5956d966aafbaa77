//! Session probes: how the gate asks the verifier about a cookie header.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{CACHE_CONTROL, COOKIE, PRAGMA},
    redirect::Policy,
    Client,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::{
    session::{SessionCookies, SessionError, SessionManager},
    APP_USER_AGENT,
};

#[async_trait]
pub trait SessionProbe: Send + Sync {
    /// True when the verifier accepts the forwarded `Cookie` header.
    /// Any failure, including transport errors, is `false`.
    async fn probe(&self, cookie_header: &str) -> bool;
}

/// Calls the verification endpoint over HTTP, forwarding the raw cookie header.
#[derive(Debug)]
pub struct HttpSessionProbe {
    client: Client,
    verify_url: Url,
}

impl HttpSessionProbe {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(verify_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .context("Failed to build session verification client")?;
        Ok(Self { client, verify_url })
    }
}

#[async_trait]
impl SessionProbe for HttpSessionProbe {
    #[instrument(skip_all, fields(url = %self.verify_url))]
    async fn probe(&self, cookie_header: &str) -> bool {
        // Single attempt, never cached: validity can change between requests.
        let request = self
            .client
            .get(self.verify_url.clone())
            .header(COOKIE, cookie_header)
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache");

        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!("Session rejected by verifier: {}", response.status());
                false
            }
            Err(err) => {
                error!("Failed to verify session: {err}");
                false
            }
        }
    }
}

/// Verifies in-process when the gate and the verifier share a binary.
#[derive(Debug)]
pub struct LocalSessionProbe {
    sessions: Arc<SessionManager>,
}

impl LocalSessionProbe {
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl SessionProbe for LocalSessionProbe {
    async fn probe(&self, cookie_header: &str) -> bool {
        match self.sessions.verify(&SessionCookies::parse(cookie_header)) {
            Ok(_) => true,
            Err(err @ (SessionError::NotConfigured | SessionError::TrustMaterial(_))) => {
                warn!("Cannot verify session: {err}");
                false
            }
            Err(err) => {
                debug!("Session rejected: {err}");
                false
            }
        }
    }
}

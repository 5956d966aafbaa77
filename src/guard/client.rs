use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::SessionClient;
use crate::{session::SESSION_PATH, APP_USER_AGENT};

/// Talks to `/api/auth/session` on the app's own origin.
#[derive(Debug, Clone)]
pub struct HttpSessionClient {
    client: Client,
    endpoint: Url,
}

impl HttpSessionClient {
    /// # Errors
    ///
    /// Returns an error if `origin` cannot be joined with the session path or
    /// the HTTP client cannot be built.
    pub fn new(origin: &Url) -> Result<Self> {
        let endpoint = origin
            .join(SESSION_PATH)
            .with_context(|| format!("Invalid origin: {origin}"))?;
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build session client")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    async fn create_session(&self, id_token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "idToken": id_token }))
            .send()
            .await
            .context("Failed to reach session endpoint")?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("{status}: {body}"))
    }

    async fn clear_session(&self) -> Result<()> {
        self.client
            .delete(self.endpoint.clone())
            .send()
            .await
            .context("Failed to reach session endpoint")?
            .error_for_status()?;
        Ok(())
    }
}

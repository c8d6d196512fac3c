//! Hosted Auth
//!
//! Resolves a caller's bearer token through the platform's `/auth/v1/user`.

use async_trait::async_trait;
use relay_payments::{
    auth::{AuthenticatedUser, Authenticator, bearer_token},
    config::RelayConfig,
    error::{PaymentError, Result},
};

/// Token verification against the hosted auth service
pub struct SupabaseAuth {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseAuth {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Uses the public key when present, else the service key
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let url = config
            .store_url
            .as_ref()
            .ok_or_else(|| PaymentError::Config("hosted store URL is required for auth".into()))?;
        let key = config
            .store_anon_key
            .as_ref()
            .or(config.store_service_key.as_ref())
            .ok_or_else(|| PaymentError::Config("an API key is required for auth".into()))?;
        Ok(Self::new(url, key))
    }
}

#[async_trait]
impl Authenticator for SupabaseAuth {
    async fn authenticate(&self, authorization: &str) -> Result<AuthenticatedUser> {
        let token = bearer_token(authorization)
            .ok_or_else(|| PaymentError::Unauthorized("malformed authorization header".into()))?;

        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Token rejected by auth service");
            return Err(PaymentError::Unauthorized("user not authenticated".into()));
        }

        response
            .json::<AuthenticatedUser>()
            .await
            .map_err(|e| PaymentError::Unauthorized(format!("unexpected user payload: {e}")))
    }
}

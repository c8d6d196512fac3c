//! HTTP Webhook Transport
//!
//! Implementation of `WebhookTransport` over `reqwest`.

use async_trait::async_trait;
use relay_payments::{
    error::{PaymentError, Result},
    transport::{TransportResponse, WebhookTransport},
};

/// `reqwest`-backed transport with the client's default timeouts
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<TransportResponse> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Could not read webhook response body");
                String::new()
            }
        };

        Ok(TransportResponse { status, body })
    }
}

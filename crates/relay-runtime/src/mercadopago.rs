//! Mercado Pago Processor
//!
//! Implementation of `PaymentProcessor` against the Mercado Pago REST API.

use async_trait::async_trait;
use relay_payments::{
    config::RelayConfig,
    error::{PaymentError, Result},
    model::truncate_body,
    processor::{CredentialProbe, PaymentProcessor, ProcessorPayment},
};
use reqwest::Url;
use serde::Deserialize;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.mercadopago.com";

/// Mercado Pago client
pub struct MercadoPagoClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MercadoPagoClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.into(),
            access_token: access_token.into(),
        }
    }

    /// Point at another API root (sandbox, local fake)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Create from configuration; fails without an access token
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Ok(Self::new(config.require_processor_token()?))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PaymentError::Config(format!("invalid processor base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| PaymentError::Config("processor base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn upstream_error(response: reqwest::Response) -> PaymentError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        PaymentError::UpstreamLookup {
            status,
            body: truncate_body(&body),
        }
    }
}

fn unreachable_upstream(err: &reqwest::Error) -> PaymentError {
    PaymentError::UpstreamLookup {
        status: 502,
        body: err.to_string(),
    }
}

#[derive(Deserialize)]
struct PreferenceResponse {
    init_point: Option<String>,
}

#[async_trait]
impl PaymentProcessor for MercadoPagoClient {
    async fn fetch_payment(&self, payment_id: &str) -> Result<ProcessorPayment> {
        let url = self.endpoint(&["v1", "payments", payment_id])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| unreachable_upstream(&e))?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        response
            .json::<ProcessorPayment>()
            .await
            .map_err(|e| PaymentError::UpstreamLookup {
                status: 502,
                body: format!("unexpected payment payload: {e}"),
            })
    }

    async fn probe_credentials(&self) -> Result<CredentialProbe> {
        let url = self.endpoint(&["checkout", "preferences"])?;
        let preference = serde_json::json!({
            "items": [{
                "title": "Token check",
                "quantity": 1,
                "unit_price": 1.00,
                "currency_id": "BRL",
            }],
            "payer": { "email": "test@test.com" },
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&preference)
            .send()
            .await
            .map_err(|e| unreachable_upstream(&e))?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::UpstreamLookup { status: 502, body: e.to_string() })?;

        Ok(CredentialProbe {
            init_point: preference.init_point,
        })
    }

    fn name(&self) -> &str {
        "MercadoPago"
    }
}

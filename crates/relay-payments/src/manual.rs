//! Manual Webhook Test
//!
//! Lets a signed-in user push a synthetic event through the relay sender to
//! any URL they supply, and see exactly what the endpoint answered.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::AuthenticatedUser;
use crate::error::{PaymentError, Result};
use crate::model::{DeliverySource, RelayPayload};
use crate::relay::RelaySender;

/// Amount carried by test payloads
pub const TEST_AMOUNT: Decimal = dec!(39.00);

/// What the caller gets back
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualTestReport {
    pub success: bool,
    pub status: u16,
    pub message: String,
    /// Endpoint response body, truncated
    pub response: String,
}

/// Accept only absolute http(s) URLs
pub fn parse_webhook_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PaymentError::Validation("webhook_url is required".into()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| PaymentError::Validation(format!("invalid webhook_url: {e}")))?;

    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(PaymentError::Validation(
            "webhook_url must be an http or https URL".into(),
        )),
    }
}

/// Manual test trigger
#[derive(Clone)]
pub struct ManualTestTrigger {
    relay: RelaySender,
}

impl ManualTestTrigger {
    pub const fn new(relay: RelaySender) -> Self {
        Self { relay }
    }

    pub async fn run(&self, caller: &AuthenticatedUser, webhook_url: &str) -> Result<ManualTestReport> {
        let url = parse_webhook_url(webhook_url)?;
        let email = caller.email.clone().unwrap_or_default();
        let payload = RelayPayload::test(&email, TEST_AMOUNT, Utc::now());

        tracing::info!(user_id = %caller.user_id, url = %url, "Testing webhook");

        let outcome = self
            .relay
            .deliver(url.as_str(), &payload, &caller.user_id, DeliverySource::ManualTest)
            .await;

        Ok(ManualTestReport {
            success: outcome.success,
            status: outcome.status,
            message: if outcome.success {
                "Webhook tested successfully".into()
            } else {
                "Webhook test failed".into()
            },
            response: outcome.body,
        })
    }
}

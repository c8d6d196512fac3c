//! Relay Sender
//!
//! Delivers a payload to a subscriber endpoint with bounded retry and
//! exponential backoff. Every attempt leaves one row in the delivery log.
//!
//! ```text
//!  Attempt(1) ──fail──▶ Wait(2s) ──▶ Attempt(2) ──fail──▶ Wait(4s) ──▶ Attempt(3)
//!      │                                  │                               │
//!     2xx                                2xx                         2xx / fail
//!      ▼                                  ▼                               ▼
//!   Done(ok)                          Done(ok)                        Done(last)
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::error::PaymentError;
use crate::model::{DeliveryLogEntry, DeliveryOutcome, DeliverySource, RelayPayload};
use crate::store::DeliveryLogStore;
use crate::transport::WebhookTransport;

/// Attempt budget and backoff unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub const fn from_config(config: &RelayConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.backoff_base,
        }
    }

    /// Wait after a failed attempt `n` (1-based): `2^n` units
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

enum DeliveryState {
    Attempt(u32),
    Wait { next: u32, delay: Duration },
    Done(DeliveryOutcome),
}

/// Delivery with retry and audit logging
#[derive(Clone)]
pub struct RelaySender {
    transport: Arc<dyn WebhookTransport>,
    logs: Arc<dyn DeliveryLogStore>,
    policy: RetryPolicy,
}

impl RelaySender {
    pub fn new(transport: Arc<dyn WebhookTransport>, logs: Arc<dyn DeliveryLogStore>) -> Self {
        Self {
            transport,
            logs,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deliver `payload` to `url` on behalf of `owner`.
    ///
    /// Never fails: exhaustion is reported as `success == false` carrying the
    /// last attempt's status and body.
    pub async fn deliver(
        &self,
        url: &str,
        payload: &RelayPayload,
        owner: &str,
        source: DeliverySource,
    ) -> DeliveryOutcome {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(e) => return DeliveryOutcome::transport_failure(&e.to_string()),
        };

        let mut state = DeliveryState::Attempt(1);

        loop {
            state = match state {
                DeliveryState::Attempt(attempt) if attempt > self.policy.max_attempts => {
                    DeliveryState::Done(DeliveryOutcome::transport_failure(&format!(
                        "delivery failed after {} attempts",
                        self.policy.max_attempts
                    )))
                }
                DeliveryState::Attempt(attempt) => {
                    let outcome = self.attempt(url, &body, attempt).await;
                    self.record(owner, payload, url, &outcome, source).await;

                    if outcome.success {
                        DeliveryState::Done(outcome)
                    } else if attempt < self.policy.max_attempts {
                        DeliveryState::Wait {
                            next: attempt + 1,
                            delay: self.policy.delay_after(attempt),
                        }
                    } else {
                        DeliveryState::Done(outcome)
                    }
                }
                DeliveryState::Wait { next, delay } => {
                    tracing::info!(delay_ms = delay.as_millis() as u64, "Waiting before next delivery attempt");
                    tokio::time::sleep(delay).await;
                    DeliveryState::Attempt(next)
                }
                DeliveryState::Done(outcome) => return outcome,
            };
        }
    }

    async fn attempt(&self, url: &str, body: &serde_json::Value, attempt: u32) -> DeliveryOutcome {
        tracing::info!(
            url = %url,
            attempt,
            max_attempts = self.policy.max_attempts,
            "Sending webhook"
        );

        match self.transport.post_json(url, body).await {
            Ok(response) => {
                let outcome = DeliveryOutcome::from_response(response.status, &response.body);
                if outcome.success {
                    tracing::info!(url = %url, status = response.status, attempt, "Webhook delivered");
                } else {
                    tracing::warn!(url = %url, status = response.status, attempt, "Webhook rejected");
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(url = %url, attempt, error = %e, "Webhook attempt failed");
                DeliveryOutcome::transport_failure(&transport_message(&e))
            }
        }
    }

    async fn record(
        &self,
        owner: &str,
        payload: &RelayPayload,
        url: &str,
        outcome: &DeliveryOutcome,
        source: DeliverySource,
    ) {
        let entry = DeliveryLogEntry::for_attempt(owner, payload, url, outcome, source);
        if let Err(e) = self.logs.append(&entry).await {
            tracing::warn!(url = %url, error = %e, "Failed to record webhook delivery");
        }
    }
}

fn transport_message(err: &PaymentError) -> String {
    match err {
        PaymentError::Transport(msg) if !msg.is_empty() => msg.clone(),
        PaymentError::Transport(_) => "unknown transport error".into(),
        other => other.to_string(),
    }
}

//! Payment Notification Reconciler
//!
//! Turns a processor notification into local state: validates it, fetches
//! the authoritative payment, upserts the ledger and, for approved payments,
//! grants premium and relays the event to the buyer's webhook.
//!
//! Only validation and the processor lookup can fail the call. Everything
//! after a successful lookup is best-effort and logged, so the processor
//! gets its acknowledgment.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::error::{PaymentError, Result};
use crate::model::{DeliveryOutcome, DeliverySource, PaymentRecord, Profile, RelayPayload};
use crate::processor::{PaymentProcessor, ProcessorPayment};
use crate::relay::RelaySender;
use crate::store::Stores;

/// Notification `type` that carries a payment
pub const PAYMENT_EVENT: &str = "payment";

/// Inbound notification body: `{ "type": ..., "data": { "id": ... } }`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,

    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default, deserialize_with = "optional_id")]
    pub id: Option<String>,
}

impl Notification {
    pub fn payment(id: impl Into<String>) -> Self {
        Self {
            event_type: Some(PAYMENT_EVENT.into()),
            data: Some(NotificationData { id: Some(id.into()) }),
        }
    }

    pub fn is_payment(&self) -> bool {
        self.event_type.as_deref() == Some(PAYMENT_EVENT)
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.data.as_ref()?.id.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// `Ok(None)` for non-payment events, the payment id otherwise.
    /// A payment event without an id is a validation error.
    pub fn validated_payment_id(&self) -> Result<Option<&str>> {
        if !self.is_payment() {
            return Ok(None);
        }
        self.payment_id()
            .map(Some)
            .ok_or_else(|| PaymentError::Validation("Payment ID not found".into()))
    }
}

fn optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// What the reconciler did with a notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not a payment notification; acknowledged without side effects
    Ignored { event_type: String },

    /// Payment looked up and reconciled
    Processed {
        payment_id: String,
        status: String,
        owner: Option<String>,
        premium_granted: bool,
        relayed: Option<DeliveryOutcome>,
    },
}

/// Payment event reconciler
#[derive(Clone)]
pub struct Reconciler {
    processor: Arc<dyn PaymentProcessor>,
    stores: Stores,
    relay: RelaySender,
}

impl Reconciler {
    pub fn new(processor: Arc<dyn PaymentProcessor>, stores: Stores, relay: RelaySender) -> Self {
        Self {
            processor,
            stores,
            relay,
        }
    }

    /// Reconcile one notification
    pub async fn handle(&self, notification: &Notification) -> Result<ReconcileOutcome> {
        let validated = notification
            .validated_payment_id()
            .inspect_err(|_| tracing::error!("Payment notification without data.id"))?;
        let Some(payment_id) = validated else {
            let event_type = notification.event_type.clone().unwrap_or_default();
            tracing::info!(event_type = %event_type, "Ignoring non-payment notification");
            return Ok(ReconcileOutcome::Ignored { event_type });
        };

        tracing::info!(payment_id = %payment_id, processor = self.processor.name(), "Fetching payment");
        let payment = self
            .processor
            .fetch_payment(payment_id)
            .await
            .inspect_err(|e| tracing::error!(payment_id = %payment_id, error = %e, "Payment lookup failed"))?;

        tracing::info!(
            payment_id = %payment.id,
            status = %payment.status,
            email = %payment.payer_email(),
            amount = ?payment.transaction_amount,
            "Payment fetched"
        );

        let owner = self.resolve_owner(&payment).await;
        let record = payment.to_record(owner.as_ref());
        self.persist(&record).await;

        let mut outcome = ReconcileOutcome::Processed {
            payment_id: record.payment_id.clone(),
            status: record.status.clone(),
            owner: record.user_id.clone(),
            premium_granted: false,
            relayed: None,
        };

        if !record.is_approved() {
            return Ok(outcome);
        }

        let Some(owner) = owner else {
            tracing::warn!(
                payment_id = %record.payment_id,
                email = %record.email,
                "Approved payment has no matching profile; skipping entitlement and relay"
            );
            return Ok(outcome);
        };

        tracing::info!(payment_id = %record.payment_id, user_id = %owner.user_id, "Payment approved");
        let granted = self.grant_premium(&owner).await;
        let delivered = self.relay_to_subscriber(&owner.user_id, &record).await;

        if let ReconcileOutcome::Processed { premium_granted, relayed, .. } = &mut outcome {
            *premium_granted = granted;
            *relayed = delivered;
        }

        Ok(outcome)
    }

    /// Buyer's profile: the user id set as external reference at checkout,
    /// else the profile whose email matches the payer.
    async fn resolve_owner(&self, payment: &ProcessorPayment) -> Option<Profile> {
        if let Some(reference) = payment.external_reference.as_deref().filter(|r| !r.is_empty()) {
            match self.stores.profiles.find_by_user_id(reference).await {
                Ok(Some(profile)) => return Some(profile),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Profile lookup by reference failed"),
            }
        }

        let email = payment.payer_email();
        if email.is_empty() {
            return None;
        }

        self.stores
            .profiles
            .find_by_email(&email)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Profile lookup by email failed"))
            .ok()
            .flatten()
    }

    async fn persist(&self, record: &PaymentRecord) {
        match self.stores.payments.upsert(record).await {
            Ok(()) => tracing::info!(payment_id = %record.payment_id, "Payment saved"),
            Err(e) => tracing::warn!(
                payment_id = %record.payment_id,
                error = %e,
                "Failed to save payment; continuing"
            ),
        }
    }

    async fn grant_premium(&self, owner: &Profile) -> bool {
        match self.stores.profiles.set_premium(&owner.user_id).await {
            Ok(true) => {
                tracing::info!(user_id = %owner.user_id, "Premium activated");
                true
            }
            Ok(false) => {
                tracing::warn!(user_id = %owner.user_id, "Profile vanished before premium update");
                false
            }
            Err(e) => {
                tracing::warn!(user_id = %owner.user_id, error = %e, "Failed to activate premium");
                false
            }
        }
    }

    async fn relay_to_subscriber(&self, user_id: &str, record: &PaymentRecord) -> Option<DeliveryOutcome> {
        let subscription = match self.stores.subscriptions.active_for_user(user_id).await {
            Ok(Some(sub)) if sub.is_deliverable() => sub,
            Ok(_) => {
                tracing::debug!(user_id = %user_id, "No active webhook configured");
                return None;
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Webhook settings lookup failed");
                return None;
            }
        };

        let payload = RelayPayload::payment_success(record, Utc::now());
        tracing::info!(user_id = %user_id, url = %subscription.webhook_url, "Relaying payment to webhook");

        Some(
            self.relay
                .deliver(&subscription.webhook_url, &payload, user_id, DeliverySource::Processor)
                .await,
        )
    }
}

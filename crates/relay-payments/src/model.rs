//! Relay Domain Records
//!
//! Rows owned by the backing store plus the wire payloads the relay emits.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status string the processor reports for a settled payment
pub const APPROVED_STATUS: &str = "approved";

/// Upper bound on stored/returned response bodies, in characters
pub const MAX_BODY_CHARS: usize = 1000;

/// Check the processor status against the approval sentinel
pub fn is_approved(status: &str) -> bool {
    status == APPROVED_STATUS
}

/// Keep at most [`MAX_BODY_CHARS`] characters of a response body
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

/// Ledger row, one per processor payment id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Processor payment identifier (upsert key)
    pub payment_id: String,

    /// Payer email
    pub email: String,

    /// Free-text processor status ("approved", "pending", ...)
    pub status: String,

    /// Transaction amount
    pub amount: Decimal,

    /// Payment method label
    pub payment_method: Option<String>,

    /// Owning user, when it could be resolved
    pub user_id: Option<String>,
}

impl PaymentRecord {
    pub fn is_approved(&self) -> bool {
        is_approved(&self.status)
    }
}

/// User profile carrying the entitlement flag
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub email: String,
    pub is_premium: bool,
}

/// Per-user outbound webhook destination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub user_id: String,
    pub webhook_url: String,
    pub is_active: bool,
}

impl WebhookSubscription {
    /// Usable for relays: active and pointing somewhere
    pub fn is_deliverable(&self) -> bool {
        self.is_active && !self.webhook_url.trim().is_empty()
    }
}

/// Where a delivery originated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliverySource {
    /// Relayed from a processor notification
    #[serde(rename = "mercado_pago")]
    Processor,

    /// Triggered by a user from the settings page
    #[serde(rename = "manual_test")]
    ManualTest,
}

impl DeliverySource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processor => "mercado_pago",
            Self::ManualTest => "manual_test",
        }
    }
}

impl std::fmt::Display for DeliverySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit row, one per delivery attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub id: Uuid,

    /// Owner of the destination
    pub user_id: String,

    /// `event_type` of the relayed payload
    pub event_type: String,

    pub webhook_url: String,

    pub success: bool,

    /// HTTP status; absent when the request never got a response
    pub response_status: Option<u16>,

    /// Response body, truncated
    pub response_body: String,

    pub source: DeliverySource,

    pub created_at: DateTime<Utc>,
}

impl DeliveryLogEntry {
    /// Build the audit row for one attempt
    pub fn for_attempt(
        user_id: &str,
        payload: &RelayPayload,
        webhook_url: &str,
        outcome: &DeliveryOutcome,
        source: DeliverySource,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            event_type: payload.event_type.clone(),
            webhook_url: webhook_url.to_string(),
            success: outcome.success,
            response_status: (outcome.status != 0).then_some(outcome.status),
            response_body: truncate_body(&outcome.body),
            source,
            created_at: Utc::now(),
        }
    }
}

/// JSON body posted to a subscriber
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPayload {
    pub event_type: String,
    pub payment_id: String,
    pub email: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: String,
    pub payment_method: Option<String>,
    pub timestamp: String,
}

impl RelayPayload {
    /// Event type for relayed approvals
    pub const PAYMENT_SUCCESS: &'static str = "payment_success";

    /// Event type for manual tests
    pub const TEST: &'static str = "test";

    /// Payload announcing an approved payment
    pub fn payment_success(record: &PaymentRecord, now: DateTime<Utc>) -> Self {
        Self {
            event_type: Self::PAYMENT_SUCCESS.into(),
            payment_id: record.payment_id.clone(),
            email: record.email.clone(),
            amount: record.amount,
            status: record.status.clone(),
            payment_method: record.payment_method.clone(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Synthetic payload for endpoint self-checks
    pub fn test(email: &str, amount: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            event_type: Self::TEST.into(),
            payment_id: format!("test_{}", now.timestamp_millis()),
            email: email.to_string(),
            amount,
            status: Self::TEST.into(),
            payment_method: Some(Self::TEST.into()),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Result of one delivery (or of the last attempt of a retried delivery)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,

    /// HTTP status, 0 when the transport failed
    pub status: u16,

    /// Truncated response body or transport error message
    pub body: String,
}

impl DeliveryOutcome {
    pub fn from_response(status: u16, body: &str) -> Self {
        Self {
            success: (200..300).contains(&status),
            status,
            body: truncate_body(body),
        }
    }

    pub fn transport_failure(message: &str) -> Self {
        Self {
            success: false,
            status: 0,
            body: truncate_body(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(5000);
        assert_eq!(truncate_body(&long).chars().count(), 1000);
        assert_eq!(truncate_body("short"), "short");

        // multi-byte characters are counted, not bytes
        let accented = "é".repeat(1500);
        let truncated = truncate_body(&accented);
        assert_eq!(truncated.chars().count(), 1000);
        assert_eq!(truncated.len(), 2000);
    }

    #[test]
    fn test_outcome_success_range() {
        assert!(DeliveryOutcome::from_response(200, "").success);
        assert!(DeliveryOutcome::from_response(204, "").success);
        assert!(!DeliveryOutcome::from_response(301, "").success);
        assert!(!DeliveryOutcome::from_response(500, "").success);
        assert!(!DeliveryOutcome::transport_failure("dns").success);
    }

    #[test]
    fn test_payment_success_payload_json() {
        let record = PaymentRecord {
            payment_id: "PMT1".into(),
            email: "a@b.com".into(),
            status: "approved".into(),
            amount: dec!(39.0),
            payment_method: Some("credit_card".into()),
            user_id: Some("user-1".into()),
        };
        let payload = RelayPayload::payment_success(&record, Utc::now());
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["event_type"], "payment_success");
        assert_eq!(json["payment_id"], "PMT1");
        assert_eq!(json["email"], "a@b.com");
        assert_eq!(json["amount"], serde_json::json!(39.0));
        assert_eq!(json["payment_method"], "credit_card");
    }

    #[test]
    fn test_log_entry_drops_synthetic_status() {
        let payload = RelayPayload::test("a@b.com", dec!(39.00), Utc::now());
        let failed = DeliveryOutcome::transport_failure("connection refused");
        let entry = DeliveryLogEntry::for_attempt(
            "user-1",
            &payload,
            "http://localhost:1",
            &failed,
            DeliverySource::ManualTest,
        );
        assert_eq!(entry.response_status, None);
        assert_eq!(entry.event_type, "test");
        assert_eq!(entry.source.as_str(), "manual_test");
    }

    #[test]
    fn test_test_payload_shape() {
        let now = Utc::now();
        let payload = RelayPayload::test("me@x.com", dec!(39.00), now);
        assert_eq!(payload.payment_id, format!("test_{}", now.timestamp_millis()));
        assert_eq!(payload.status, "test");
        assert_eq!(payload.payment_method.as_deref(), Some("test"));
    }
}

//! Payment Processor Integration
//!
//! Authoritative payment lookups. Inbound notifications only carry an id;
//! status, amount and payer always come from the processor itself.

mod mock;

pub use mock::StaticProcessor;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::model::{PaymentRecord, Profile};

/// Processor client trait
///
/// Implemented over HTTP in `relay-runtime`; [`StaticProcessor`] serves tests.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Fetch a payment by id. Non-success responses are `UpstreamLookup`.
    async fn fetch_payment(&self, payment_id: &str) -> Result<ProcessorPayment>;

    /// Exercise the credentials with a harmless authenticated call
    async fn probe_credentials(&self) -> Result<CredentialProbe>;

    /// Processor name
    fn name(&self) -> &str;
}

/// Payer details attached to a payment
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub email: Option<String>,
}

/// Payment as reported by the processor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorPayment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    pub status: String,

    #[serde(default)]
    pub payer: Option<Payer>,

    #[serde(default)]
    pub transaction_amount: Option<Decimal>,

    #[serde(default)]
    pub payment_type_id: Option<String>,

    #[serde(default)]
    pub payment_method_id: Option<String>,

    /// Set by us at checkout; carries the buyer's user id
    #[serde(default)]
    pub external_reference: Option<String>,
}

impl ProcessorPayment {
    /// Payer email as reported, empty when absent
    pub fn payer_email(&self) -> String {
        self.payer
            .as_ref()
            .and_then(|p| p.email.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_default()
    }

    /// Payment type, falling back to the concrete method
    pub fn payment_method(&self) -> Option<String> {
        self.payment_type_id
            .clone()
            .or_else(|| self.payment_method_id.clone())
    }

    /// Ledger row for this payment, attributed to `owner` when resolved.
    ///
    /// A payment without payer email takes the owner's profile email.
    pub fn to_record(&self, owner: Option<&Profile>) -> PaymentRecord {
        let mut email = self.payer_email();
        if email.is_empty() {
            email = owner.map(|p| p.email.clone()).unwrap_or_default();
        }

        PaymentRecord {
            payment_id: self.id.clone(),
            email,
            status: self.status.clone(),
            amount: self.transaction_amount.unwrap_or(Decimal::ZERO),
            payment_method: self.payment_method(),
            user_id: owner.map(|p| p.user_id.clone()),
        }
    }
}

/// Result of a credential probe
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialProbe {
    /// Checkout URL of the throwaway preference
    pub init_point: Option<String>,
}

/// Accept ids sent either as JSON strings or numbers
pub fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

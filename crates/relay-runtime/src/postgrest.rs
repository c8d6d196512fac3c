//! Hosted Store (PostgREST)
//!
//! Implements the four relay stores over the hosted platform's REST API,
//! authenticated with the service credential.
//!
//! Tables: `payments` (unique `payment_id`), `profiles` (`user_id`, `email`,
//! `is_premium`), `webhook_settings` (unique `user_id`) and `webhook_logs`.
//! `profiles.email` is stored lowercase.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_payments::{
    config::RelayConfig,
    error::{PaymentError, Result},
    model::{DeliveryLogEntry, DeliverySource, PaymentRecord, Profile, WebhookSubscription},
    store::{DeliveryLogStore, PaymentStore, ProfileStore, SubscriptionStore},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// PostgREST-backed store
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl PostgrestStore {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    /// Create from configuration
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        match (&config.store_url, &config.store_service_key) {
            (Some(url), Some(key)) => Ok(Self::new(url, key)),
            _ => Err(PaymentError::Config("hosted store URL and service key are required".into())),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}/rest/v1/{name}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table(table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(table: &str, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| PaymentError::Storage(format!("{table}: {e}")))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(PaymentError::Storage(format!("{table}: {status} {body}")))
    }

    async fn rows<T: DeserializeOwned>(table: &str, builder: reqwest::RequestBuilder) -> Result<Vec<T>> {
        Self::send(table, builder)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| PaymentError::Storage(format!("{table}: {e}")))
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[derive(Serialize, Deserialize)]
struct PaymentRow {
    payment_id: String,
    email: String,
    status: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    payment_method: Option<String>,
    user_id: Option<String>,
}

impl From<&PaymentRecord> for PaymentRow {
    fn from(record: &PaymentRecord) -> Self {
        Self {
            payment_id: record.payment_id.clone(),
            email: record.email.clone(),
            status: record.status.clone(),
            amount: record.amount,
            payment_method: record.payment_method.clone(),
            user_id: record.user_id.clone(),
        }
    }
}

impl From<PaymentRow> for PaymentRecord {
    fn from(row: PaymentRow) -> Self {
        Self {
            payment_id: row.payment_id,
            email: row.email,
            status: row.status,
            amount: row.amount,
            payment_method: row.payment_method,
            user_id: row.user_id,
        }
    }
}

#[derive(Deserialize)]
struct ProfileRow {
    user_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    is_premium: Option<bool>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: row.user_id,
            email: row.email.unwrap_or_default(),
            is_premium: row.is_premium.unwrap_or(false),
        }
    }
}

#[derive(Deserialize)]
struct SettingsRow {
    user_id: String,
    webhook_url: String,
    #[serde(default)]
    is_active: Option<bool>,
}

#[derive(Serialize)]
struct NewLogRow<'a> {
    id: Uuid,
    user_id: &'a str,
    event_type: &'a str,
    webhook_url: &'a str,
    success: bool,
    response_status: Option<u16>,
    response_body: &'a str,
    source: &'static str,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct LogRow {
    id: Uuid,
    user_id: String,
    event_type: String,
    webhook_url: String,
    success: bool,
    response_status: Option<u16>,
    #[serde(default)]
    response_body: Option<String>,
    #[serde(default)]
    source: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<LogRow> for DeliveryLogEntry {
    fn from(row: LogRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            event_type: row.event_type,
            webhook_url: row.webhook_url,
            success: row.success,
            response_status: row.response_status,
            response_body: row.response_body.unwrap_or_default(),
            source: match row.source.as_deref() {
                Some("manual_test") => DeliverySource::ManualTest,
                _ => DeliverySource::Processor,
            },
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PaymentStore for PostgrestStore {
    async fn upsert(&self, record: &PaymentRecord) -> Result<()> {
        let builder = self
            .request(reqwest::Method::POST, "payments")
            .query(&[("on_conflict", "payment_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&PaymentRow::from(record));
        Self::send("payments", builder).await.map(|_| ())
    }

    async fn get(&self, payment_id: &str) -> Result<Option<PaymentRecord>> {
        let builder = self
            .request(reqwest::Method::GET, "payments")
            .query(&[("payment_id", eq(payment_id)), ("limit", "1".into())]);
        let rows: Vec<PaymentRow> = Self::rows("payments", builder).await?;
        Ok(rows.into_iter().next().map(Into::into))
    }
}

#[async_trait]
impl ProfileStore for PostgrestStore {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Profile>> {
        let builder = self
            .request(reqwest::Method::GET, "profiles")
            .query(&[("user_id", eq(user_id)), ("limit", "1".into())]);
        let rows: Vec<ProfileRow> = Self::rows("profiles", builder).await?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>> {
        // Exact match only: `ilike` would treat `%`, `*` and `_` in the payer email as wildcards
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Ok(None);
        }
        let builder = self
            .request(reqwest::Method::GET, "profiles")
            .query(&[("email", eq(&email)), ("limit", "1".into())]);
        let rows: Vec<ProfileRow> = Self::rows("profiles", builder).await?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    async fn set_premium(&self, user_id: &str) -> Result<bool> {
        let builder = self
            .request(reqwest::Method::PATCH, "profiles")
            .query(&[("user_id", eq(user_id))])
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "is_premium": true }));
        let rows: Vec<ProfileRow> = Self::rows("profiles", builder).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl SubscriptionStore for PostgrestStore {
    async fn active_for_user(&self, user_id: &str) -> Result<Option<WebhookSubscription>> {
        let builder = self.request(reqwest::Method::GET, "webhook_settings").query(&[
            ("select", "user_id,webhook_url,is_active".to_string()),
            ("user_id", eq(user_id)),
            ("is_active", "eq.true".into()),
            ("limit", "1".into()),
        ]);
        let rows: Vec<SettingsRow> = Self::rows("webhook_settings", builder).await?;
        Ok(rows.into_iter().next().map(|row| WebhookSubscription {
            user_id: row.user_id,
            webhook_url: row.webhook_url,
            is_active: row.is_active.unwrap_or(false),
        }))
    }
}

#[async_trait]
impl DeliveryLogStore for PostgrestStore {
    async fn append(&self, entry: &DeliveryLogEntry) -> Result<()> {
        let row = NewLogRow {
            id: entry.id,
            user_id: &entry.user_id,
            event_type: &entry.event_type,
            webhook_url: &entry.webhook_url,
            success: entry.success,
            response_status: entry.response_status,
            response_body: &entry.response_body,
            source: entry.source.as_str(),
            created_at: entry.created_at,
        };
        let builder = self
            .request(reqwest::Method::POST, "webhook_logs")
            .header("Prefer", "return=minimal")
            .json(&row);
        Self::send("webhook_logs", builder).await.map(|_| ())
    }

    async fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<DeliveryLogEntry>> {
        let builder = self.request(reqwest::Method::GET, "webhook_logs").query(&[
            ("user_id", eq(user_id)),
            ("order", "created_at.desc".into()),
            ("limit", limit.to_string()),
        ]);
        let rows: Vec<LogRow> = Self::rows("webhook_logs", builder).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

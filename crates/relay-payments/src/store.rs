//! Store Contracts
//!
//! The relay never holds state between invocations; everything it knows
//! lives behind these traits. [`MemoryStore`] backs tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{PaymentError, Result};
use crate::model::{DeliveryLogEntry, PaymentRecord, Profile, WebhookSubscription};

/// Payment ledger keyed by processor payment id
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert or overwrite the record for `record.payment_id`
    async fn upsert(&self, record: &PaymentRecord) -> Result<()>;

    async fn get(&self, payment_id: &str) -> Result<Option<PaymentRecord>>;
}

/// Profiles and their entitlement flag
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Profile>>;

    /// Exact, case-insensitive match. No pattern semantics.
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>>;

    /// Set `is_premium = true`. Returns false when no profile matched.
    async fn set_premium(&self, user_id: &str) -> Result<bool>;
}

/// Outbound webhook settings
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The user's subscription, only if it is active
    async fn active_for_user(&self, user_id: &str) -> Result<Option<WebhookSubscription>>;
}

/// Append-only delivery audit trail
#[async_trait]
pub trait DeliveryLogStore: Send + Sync {
    async fn append(&self, entry: &DeliveryLogEntry) -> Result<()>;

    /// Newest first
    async fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<DeliveryLogEntry>>;
}

/// Handles to every store the relay touches
#[derive(Clone)]
pub struct Stores {
    pub payments: Arc<dyn PaymentStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub delivery_logs: Arc<dyn DeliveryLogStore>,
}

impl Stores {
    /// Use one backend for all four stores
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: PaymentStore + ProfileStore + SubscriptionStore + DeliveryLogStore + 'static,
    {
        Self {
            payments: backend.clone(),
            profiles: backend.clone(),
            subscriptions: backend.clone(),
            delivery_logs: backend,
        }
    }
}

/// In-memory store (for development and tests)
pub struct MemoryStore {
    payments: RwLock<HashMap<String, PaymentRecord>>,
    profiles: RwLock<HashMap<String, Profile>>,
    subscriptions: RwLock<HashMap<String, WebhookSubscription>>,
    logs: RwLock<Vec<DeliveryLogEntry>>,
    fail_payment_upserts: AtomicBool,
    mutations: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            payments: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            logs: RwLock::new(Vec::new()),
            fail_payment_upserts: AtomicBool::new(false),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Store whose payment upserts always fail
    pub fn failing_payment_upserts() -> Self {
        let store = Self::new();
        store.fail_payment_upserts.store(true, Ordering::SeqCst);
        store
    }

    /// Seed a profile (not counted as a mutation)
    pub fn insert_profile(&self, profile: Profile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(profile.user_id.clone(), profile);
        }
    }

    /// Seed a subscription (not counted as a mutation)
    pub fn insert_subscription(&self, subscription: WebhookSubscription) {
        if let Ok(mut subs) = self.subscriptions.write() {
            subs.insert(subscription.user_id.clone(), subscription);
        }
    }

    /// Writes performed through the store traits
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn payment_count(&self) -> usize {
        self.payments.read().map(|p| p.len()).unwrap_or_default()
    }

    /// Audit rows in insertion order
    pub fn log_entries(&self) -> Vec<DeliveryLogEntry> {
        self.logs.read().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn profile(&self, user_id: &str) -> Option<Profile> {
        self.profiles.read().ok()?.get(user_id).cloned()
    }

    fn touch(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| PaymentError::Storage("lock poisoned".into()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| PaymentError::Storage("lock poisoned".into()))
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn upsert(&self, record: &PaymentRecord) -> Result<()> {
        if self.fail_payment_upserts.load(Ordering::SeqCst) {
            return Err(PaymentError::Storage("payments table unavailable".into()));
        }
        write(&self.payments)?.insert(record.payment_id.clone(), record.clone());
        self.touch();
        Ok(())
    }

    async fn get(&self, payment_id: &str) -> Result<Option<PaymentRecord>> {
        Ok(read(&self.payments)?.get(payment_id).cloned())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(read(&self.profiles)?.get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(None);
        }
        Ok(read(&self.profiles)?
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn set_premium(&self, user_id: &str) -> Result<bool> {
        let mut profiles = write(&self.profiles)?;
        let Some(profile) = profiles.get_mut(user_id) else {
            return Ok(false);
        };
        profile.is_premium = true;
        self.touch();
        Ok(true)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn active_for_user(&self, user_id: &str) -> Result<Option<WebhookSubscription>> {
        Ok(read(&self.subscriptions)?
            .get(user_id)
            .filter(|s| s.is_active)
            .cloned())
    }
}

#[async_trait]
impl DeliveryLogStore for MemoryStore {
    async fn append(&self, entry: &DeliveryLogEntry) -> Result<()> {
        write(&self.logs)?.push(entry.clone());
        self.touch();
        Ok(())
    }

    async fn recent_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<DeliveryLogEntry>> {
        Ok(read(&self.logs)?
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(id: &str, status: &str) -> PaymentRecord {
        PaymentRecord {
            payment_id: id.into(),
            email: "a@b.com".into(),
            status: status.into(),
            amount: dec!(39.0),
            payment_method: None,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = MemoryStore::new();
        store.upsert(&record("PMT1", "pending")).await.unwrap();
        store.upsert(&record("PMT1", "approved")).await.unwrap();

        assert_eq!(store.payment_count(), 1);
        let stored = store.get("PMT1").await.unwrap().unwrap();
        assert_eq!(stored.status, "approved");
    }

    #[tokio::test]
    async fn test_inactive_subscription_hidden() {
        let store = MemoryStore::new();
        store.insert_subscription(WebhookSubscription {
            user_id: "u1".into(),
            webhook_url: "https://example.com/hook".into(),
            is_active: false,
        });
        assert!(store.active_for_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_premium_unknown_user() {
        let store = MemoryStore::new();
        assert!(!store.set_premium("ghost").await.unwrap());
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_find_by_email_exact() {
        let store = MemoryStore::new();
        store.insert_profile(Profile {
            user_id: "victim".into(),
            email: "victim@corp.com".into(),
            is_premium: false,
        });

        let found = store.find_by_email(" VICTIM@corp.com").await.unwrap().unwrap();
        assert_eq!(found.user_id, "victim");
        for other in ["%@%", "*", "v_ctim@corp.com", ""] {
            assert!(store.find_by_email(other).await.unwrap().is_none(), "{other}");
        }
    }

    #[tokio::test]
    async fn test_failing_upserts() {
        let store = MemoryStore::failing_payment_upserts();
        let err = store.upsert(&record("PMT1", "approved")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Storage(_)));
        assert_eq!(store.payment_count(), 0);
    }
}

//! Static Processor
//!
//! Serves canned payments. Unknown ids answer like the real API does (404).

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{CredentialProbe, PaymentProcessor, ProcessorPayment};
use crate::error::{PaymentError, Result};

/// Processor with an in-memory payment table
pub struct StaticProcessor {
    payments: RwLock<HashMap<String, ProcessorPayment>>,
    failure: Option<(u16, String)>,
    lookups: AtomicUsize,
}

impl Default for StaticProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticProcessor {
    pub fn new() -> Self {
        Self {
            payments: RwLock::new(HashMap::new()),
            failure: None,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Every lookup fails with the given status and body
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self {
            failure: Some((status, body.into())),
            ..Self::new()
        }
    }

    /// Add or replace a payment
    pub fn set_payment(&self, payment: ProcessorPayment) {
        if let Ok(mut payments) = self.payments.write() {
            payments.insert(payment.id.clone(), payment);
        }
    }

    pub fn with_payment(self, payment: ProcessorPayment) -> Self {
        self.set_payment(payment);
        self
    }

    /// Number of `fetch_payment` calls so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for StaticProcessor {
    async fn fetch_payment(&self, payment_id: &str) -> Result<ProcessorPayment> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some((status, body)) = &self.failure {
            return Err(PaymentError::UpstreamLookup {
                status: *status,
                body: body.clone(),
            });
        }

        self.payments
            .read()
            .map_err(|_| PaymentError::Storage("lock poisoned".into()))?
            .get(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::UpstreamLookup {
                status: 404,
                body: format!("payment {payment_id} not found"),
            })
    }

    async fn probe_credentials(&self) -> Result<CredentialProbe> {
        match &self.failure {
            Some((status, body)) => Err(PaymentError::UpstreamLookup {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(CredentialProbe { init_point: None }),
        }
    }

    fn name(&self) -> &str {
        "StaticProcessor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_payment_is_404() {
        let processor = StaticProcessor::new();
        let err = processor.fetch_payment("nope").await.unwrap_err();
        assert!(matches!(err, PaymentError::UpstreamLookup { status: 404, .. }));
        assert_eq!(processor.lookup_count(), 1);
    }
}

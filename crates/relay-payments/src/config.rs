//! Relay Configuration
//!
//! Secrets and endpoints are read once at startup and handed to the
//! reconciler and relay sender at construction time.

use std::time::Duration;

use crate::error::{PaymentError, Result};

/// Processor access token
pub const ENV_PROCESSOR_TOKEN: &str = "MERCADO_PAGO_ACCESS_TOKEN";
/// Optional secret for `x-signature` verification
pub const ENV_WEBHOOK_SECRET: &str = "MERCADO_PAGO_WEBHOOK_SECRET";
/// Hosted platform base URL
pub const ENV_STORE_URL: &str = "SUPABASE_URL";
/// Hosted platform service credential
pub const ENV_STORE_SERVICE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
/// Hosted platform public key, used for caller authentication
pub const ENV_STORE_ANON_KEY: &str = "SUPABASE_PUBLISHABLE_KEY";

/// Relay configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Payment processor bearer token
    pub processor_token: Option<String>,

    /// Secret shared with the processor for notification signatures
    pub webhook_secret: Option<String>,

    /// Backing store URL
    pub store_url: Option<String>,

    /// Backing store service credential
    pub store_service_key: Option<String>,

    /// Backing store public key
    pub store_anon_key: Option<String>,

    /// Server bind address
    pub bind_addr: String,

    /// Delivery attempts per relay
    pub max_attempts: u32,

    /// Backoff unit; the wait after attempt `n` is `2^n` units
    pub backoff_base: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            processor_token: None,
            webhook_secret: None,
            store_url: None,
            store_service_key: None,
            store_anon_key: None,
            bind_addr: "0.0.0.0:3000".into(),
            max_attempts: 3,
            backoff_base: Duration::from_millis(1000),
        }
    }
}

impl RelayConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self {
            processor_token: non_empty_var(ENV_PROCESSOR_TOKEN),
            webhook_secret: non_empty_var(ENV_WEBHOOK_SECRET),
            store_url: non_empty_var(ENV_STORE_URL),
            store_service_key: non_empty_var(ENV_STORE_SERVICE_KEY),
            store_anon_key: non_empty_var(ENV_STORE_ANON_KEY),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            ..Default::default()
        }
    }

    /// Startup check: the store URL and its service key come as a pair
    pub fn validate(&self) -> Result<()> {
        match (&self.store_url, &self.store_service_key) {
            (Some(_), None) => Err(PaymentError::Config(format!(
                "{ENV_STORE_URL} is set but {ENV_STORE_SERVICE_KEY} is not"
            ))),
            (None, Some(_)) => Err(PaymentError::Config(format!(
                "{ENV_STORE_SERVICE_KEY} is set but {ENV_STORE_URL} is not"
            ))),
            _ => Ok(()),
        }?;

        if self.max_attempts == 0 {
            return Err(PaymentError::Config("max_attempts must be at least 1".into()));
        }

        Ok(())
    }

    /// Processor token, or a configuration error when absent
    pub fn require_processor_token(&self) -> Result<&str> {
        self.processor_token
            .as_deref()
            .ok_or_else(|| PaymentError::Config(format!("{ENV_PROCESSOR_TOKEN} not set")))
    }

    /// Whether the hosted store is configured
    pub const fn has_store(&self) -> bool {
        self.store_url.is_some() && self.store_service_key.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

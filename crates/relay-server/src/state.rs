//! Application State

use std::sync::Arc;

use relay_payments::{
    Authenticator, ManualTestTrigger, PaymentProcessor, Reconciler, RelayConfig,
    SignatureVerifier, Stores,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,

    /// Store handles (hosted or in-memory)
    pub stores: Stores,

    /// Payment processor (None if no access token is configured)
    pub processor: Option<Arc<dyn PaymentProcessor>>,

    /// Notification reconciler; present exactly when `processor` is
    pub reconciler: Option<Arc<Reconciler>>,

    pub manual_test: Arc<ManualTestTrigger>,

    pub authenticator: Arc<dyn Authenticator>,

    /// Signature check for inbound notifications (None = not enforced)
    pub verifier: Option<SignatureVerifier>,
}

//! # relay-payments
//!
//! Payment notification reconciliation and webhook relay.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐   ┌────────────────┐   ┌──────────────┐
//! │  Processor  │──▶│   Reconciler   │──▶│  Payment     │
//! │ notification│   │ (lookup by id) │   │  ledger      │
//! └─────────────┘   └───────┬────────┘   └──────────────┘
//!                           │ approved
//!                 ┌─────────┴─────────┐
//!                 ▼                   ▼
//!          ┌─────────────┐    ┌──────────────┐    ┌─────────────┐
//!          │ Entitlement │    │ Relay Sender │───▶│ Delivery    │
//!          │ (premium)   │    │ 3x, backoff  │    │ log         │
//!          └─────────────┘    └──────┬───────┘    └─────────────┘
//!                                    ▼
//!                            subscriber webhook
//! ```
//!
//! The manual test trigger skips reconciliation and calls the relay sender
//! directly with a synthetic payload.
//!
//! Every collaborator sits behind a trait: [`PaymentProcessor`],
//! [`WebhookTransport`], the four store traits and [`Authenticator`].
//! HTTP implementations live in `relay-runtime`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_payments::{MemoryStore, Notification, Reconciler, RelaySender, Stores};
//!
//! let store = Arc::new(MemoryStore::new());
//! let relay = RelaySender::new(transport, store.clone());
//! let reconciler = Reconciler::new(processor, Stores::from_backend(store), relay);
//!
//! reconciler.handle(&Notification::payment("123456789")).await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod manual;
pub mod model;
pub mod processor;
pub mod relay;
pub mod signature;
pub mod store;
pub mod transport;
mod webhook;

pub use auth::{AuthenticatedUser, Authenticator, StaticAuthenticator};
pub use config::RelayConfig;
pub use error::{PaymentError, Result};
pub use manual::{ManualTestReport, ManualTestTrigger};
pub use model::{
    DeliveryLogEntry, DeliveryOutcome, DeliverySource, PaymentRecord, Profile, RelayPayload,
    WebhookSubscription,
};
pub use processor::{CredentialProbe, PaymentProcessor, ProcessorPayment, StaticProcessor};
pub use relay::{RelaySender, RetryPolicy};
pub use signature::SignatureVerifier;
pub use store::{
    DeliveryLogStore, MemoryStore, PaymentStore, ProfileStore, Stores, SubscriptionStore,
};
pub use transport::{ScriptedReply, ScriptedTransport, TransportResponse, WebhookTransport};
pub use webhook::{Notification, NotificationData, PAYMENT_EVENT, ReconcileOutcome, Reconciler};

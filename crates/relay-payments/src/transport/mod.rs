//! Outbound Webhook Transport
//!
//! One HTTP POST of a JSON body. Retry policy lives in the relay sender,
//! not here.

mod mock;

pub use mock::{ScriptedReply, ScriptedTransport};

use async_trait::async_trait;

use crate::error::Result;

/// Raw response of a delivery attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends JSON to subscriber endpoints
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `body` as `application/json`.
    ///
    /// Any HTTP response is `Ok`, whatever its status. `Err(Transport)` means
    /// no response was received.
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<TransportResponse>;
}

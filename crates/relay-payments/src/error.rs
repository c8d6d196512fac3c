//! Payment Relay Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors raised while reconciling a payment notification or relaying it.
///
/// Delivery exhaustion is deliberately absent: the relay sender reports it
/// through [`DeliveryOutcome`](crate::model::DeliveryOutcome) instead.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Inbound payload is malformed or incomplete
    #[error("Validation error: {0}")]
    Validation(String),

    /// The processor refused or failed the payment lookup
    #[error("Payment lookup failed with status {status}: {body}")]
    UpstreamLookup { status: u16, body: String },

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    Signature(String),

    /// Caller could not be authenticated
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Outbound HTTP call failed before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),
}

impl PaymentError {
    /// HTTP status this error is surfaced with
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Signature(_) | Self::Unauthorized(_) => 401,
            Self::UpstreamLookup { status, .. } if *status >= 400 && *status < 600 => *status,
            Self::UpstreamLookup { .. } => 502,
            Self::Config(_) | Self::Storage(_) | Self::Transport(_) => 500,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::UpstreamLookup { .. } => "Failed to fetch payment".into(),
            Self::Signature(_) => "Invalid webhook signature".into(),
            Self::Unauthorized(_) => "Unauthorized".into(),
            Self::Config(_) => "Service configuration error".into(),
            _ => "An error occurred processing your request".into(),
        }
    }
}

#[cfg(feature = "axum-handlers")]
impl axum::response::IntoResponse for PaymentError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({ "error": self.user_message() });
        (status, axum::Json(body)).into_response()
    }
}

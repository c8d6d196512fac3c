//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use relay_payments::{
    AuthenticatedUser, DeliveryLogEntry, ManualTestReport, Notification, PaymentError,
    ReconcileOutcome,
};

use crate::state::AppState;

/// Deliveries shown on the settings page
const RECENT_DELIVERIES: usize = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
    pub timestamp: String,
    pub services: HealthServices,
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthServices {
    pub processor: bool,
    pub store: bool,
    pub signature_check: bool,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualTestRequest {
    #[serde(default)]
    pub webhook_url: String,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProbeResponse {
    fn failed(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            init_point: None,
            details,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, PaymentError> {
    serde_json::from_slice(body)
        .map_err(|e| PaymentError::Validation(format!("invalid JSON body: {e}")))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthenticatedUser, PaymentError> {
    let authorization = header(headers, "authorization")
        .ok_or_else(|| PaymentError::Unauthorized("missing authorization header".into()))?;
    state.authenticator.authenticate(authorization).await
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut warnings = Vec::new();
    if state.processor.is_none() {
        warnings.push(format!("{} not configured", relay_payments::config::ENV_PROCESSOR_TOKEN));
    }
    if !state.config.has_store() {
        warnings.push("hosted store not configured; using in-memory store".into());
    }

    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        services: HealthServices {
            processor: state.processor.is_some(),
            store: state.config.has_store(),
            signature_check: state.verifier.is_some(),
        },
        warnings,
    })
}

/// Processor payment notification
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AckResponse>, PaymentError> {
    let notification: Notification = parse_json(&body)?;
    tracing::info!(
        event_type = notification.event_type.as_deref().unwrap_or_default(),
        payment_id = notification.payment_id().unwrap_or_default(),
        "Payment notification received"
    );

    // Same check the reconciler runs; needed here so the signature is verified first
    let Some(payment_id) = notification.validated_payment_id()? else {
        tracing::info!("Notification type ignored");
        return Ok(Json(AckResponse {
            success: true,
            message: Some("event type ignored".into()),
        }));
    };

    if let Some(verifier) = &state.verifier {
        let signature = header(&headers, "x-signature")
            .ok_or_else(|| PaymentError::Signature("missing x-signature header".into()))?;
        verifier
            .verify(signature, header(&headers, "x-request-id"), payment_id)
            .inspect_err(|e| tracing::warn!(payment_id = %payment_id, error = %e, "Rejected notification"))?;
    }

    let reconciler = state.reconciler.as_ref().ok_or_else(|| {
        tracing::error!("Payment notification received but processor token is not configured");
        PaymentError::Config(format!("{} not set", relay_payments::config::ENV_PROCESSOR_TOKEN))
    })?;

    match reconciler.handle(&notification).await? {
        ReconcileOutcome::Processed { payment_id, status, relayed, .. } => {
            tracing::info!(
                payment_id = %payment_id,
                status = %status,
                relayed = relayed.as_ref().map(|r| r.success),
                "Notification reconciled"
            );
        }
        ReconcileOutcome::Ignored { .. } => {}
    }

    Ok(Json(AckResponse {
        success: true,
        message: None,
    }))
}

/// Manual webhook test for the signed-in user
pub async fn manual_test(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ManualTestReport>, PaymentError> {
    let caller = authenticate(&state, &headers).await?;
    let request: ManualTestRequest = parse_json(&body)?;

    let report = state.manual_test.run(&caller, &request.webhook_url).await?;
    Ok(Json(report))
}

/// Most recent deliveries for the signed-in user
pub async fn recent_deliveries(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DeliveryLogEntry>>, PaymentError> {
    let caller = authenticate(&state, &headers).await?;
    let entries = state
        .stores
        .delivery_logs
        .recent_for_user(&caller.user_id, RECENT_DELIVERIES)
        .await?;
    Ok(Json(entries))
}

/// Check the processor credentials with a throwaway checkout preference
pub async fn probe_processor(State(state): State<AppState>) -> (StatusCode, Json<ProbeResponse>) {
    let Some(processor) = state.processor.as_ref() else {
        let message = format!("{} not set", relay_payments::config::ENV_PROCESSOR_TOKEN);
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(ProbeResponse::failed(message, None)));
    };

    match processor.probe_credentials().await {
        Ok(probe) => (
            StatusCode::OK,
            Json(ProbeResponse {
                status: "ok",
                message: "Token valid and checkout reachable".into(),
                init_point: probe.init_point,
                details: None,
            }),
        ),
        Err(PaymentError::UpstreamLookup { status, body }) => {
            tracing::error!(status, body = %body, "Processor rejected credential probe");
            let code = StatusCode::from_u16(status)
                .ok()
                .filter(|c| c.is_client_error() || c.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (code, Json(ProbeResponse::failed("Token invalid or lacking permissions", Some(body))))
        }
        Err(e) => {
            tracing::error!(error = %e, "Processor credential probe failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ProbeResponse::failed(e.to_string(), None)))
        }
    }
}

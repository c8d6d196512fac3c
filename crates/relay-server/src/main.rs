//! Payment Relay HTTP Server
//!
//! Axum-based server receiving processor notifications and exposing the
//! user-facing webhook tools.

mod app;
mod handlers;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_payments::{
    Authenticator, ManualTestTrigger, MemoryStore, PaymentProcessor, Reconciler, RelayConfig,
    RelaySender, RetryPolicy, SignatureVerifier, StaticAuthenticator, Stores,
};
use relay_runtime::{HttpTransport, MercadoPagoClient, PostgrestStore, SupabaseAuth};

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env();
    config.validate()?;

    // Stores
    let stores = if config.has_store() {
        tracing::info!("✓ Hosted store configured");
        Stores::from_backend(Arc::new(PostgrestStore::from_config(&config)?))
    } else {
        tracing::warn!("⚠ Hosted store not configured - using in-memory store");
        tracing::warn!("  Set SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY in .env");
        Stores::from_backend(Arc::new(MemoryStore::new()))
    };

    // Relay sender
    let relay = RelaySender::new(Arc::new(HttpTransport::new()), stores.delivery_logs.clone())
        .with_policy(RetryPolicy::from_config(&config));

    // Processor + reconciler
    let processor: Option<Arc<dyn PaymentProcessor>> = match MercadoPagoClient::from_config(&config) {
        Ok(client) => {
            tracing::info!("✓ Payment processor configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("⚠ {e} - payment notifications will be answered with 500");
            None
        }
    };
    let reconciler = processor
        .clone()
        .map(|p| Arc::new(Reconciler::new(p, stores.clone(), relay.clone())));

    // Caller authentication
    let authenticator: Arc<dyn Authenticator> = match SupabaseAuth::from_config(&config) {
        Ok(auth) => Arc::new(auth),
        Err(_) => {
            tracing::warn!("⚠ Hosted auth not configured - manual webhook tests are disabled");
            Arc::new(StaticAuthenticator::new())
        }
    };

    let verifier = config.webhook_secret.as_deref().map(SignatureVerifier::new);
    if verifier.is_none() {
        tracing::warn!("⚠ MERCADO_PAGO_WEBHOOK_SECRET not set - notification signatures not checked");
    }

    let addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        stores,
        processor,
        reconciler,
        manual_test: Arc::new(ManualTestTrigger::new(relay)),
        authenticator,
        verifier,
    };

    let app = app::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 payment relay running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              - Health check");
    tracing::info!("  POST /webhook/payment     - Processor notifications");
    tracing::info!("  POST /api/webhook/test    - Send a test event to a webhook");
    tracing::info!("  GET  /api/webhook/logs    - Recent webhook deliveries");
    tracing::info!("  POST /api/processor/probe - Check processor credentials");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

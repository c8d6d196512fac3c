//! # relay-runtime
//!
//! HTTP integrations for the payment relay.
//!
//! ## Integrations
//!
//! - **Transport** (always): `reqwest` POSTs to subscriber endpoints
//! - **Mercado Pago** (default): payment lookups and credential probes
//! - **Supabase** (default): PostgREST-backed stores and caller authentication
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_runtime::{HttpTransport, MercadoPagoClient, PostgrestStore};
//!
//! let processor = Arc::new(MercadoPagoClient::from_config(&config)?);
//! let store = Arc::new(PostgrestStore::from_config(&config)?);
//! let relay = RelaySender::new(Arc::new(HttpTransport::new()), store.clone());
//! ```

pub mod http;

#[cfg(feature = "mercadopago")]
pub mod mercadopago;

#[cfg(feature = "supabase")]
pub mod postgrest;

#[cfg(feature = "supabase")]
pub mod supabase_auth;

pub use http::HttpTransport;

#[cfg(feature = "mercadopago")]
pub use mercadopago::MercadoPagoClient;

#[cfg(feature = "supabase")]
pub use postgrest::PostgrestStore;

#[cfg(feature = "supabase")]
pub use supabase_auth::SupabaseAuth;

// Re-export core types for convenience
pub use relay_payments::{
    PaymentError, PaymentProcessor, RelayConfig, Result, Stores, WebhookTransport,
};

#[cfg(test)]
pub(crate) mod test_server {
    //! Throwaway local HTTP servers standing in for remote APIs.

    use axum::Router;

    /// Serve `router` on an ephemeral port and return its base URL
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }
}

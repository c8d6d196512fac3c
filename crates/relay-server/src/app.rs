//! Router Assembly

use axum::{
    Router,
    http::{HeaderName, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    health_check, manual_test, payment_webhook, probe_processor, recent_deliveries,
};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    // Browser callers (settings page) send these on top of the body
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ]);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Processor notifications
        .route("/webhook/payment", post(payment_webhook))

        // User-facing webhook tools
        .route("/api/webhook/test", post(manual_test))
        .route("/api/webhook/logs", get(recent_deliveries))

        // Operator tools
        .route("/api/processor/probe", post(probe_processor))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use relay_payments::{
        AuthenticatedUser, ManualTestTrigger, MemoryStore, PaymentProcessor, Profile,
        ProcessorPayment, Reconciler, RelayConfig, RelaySender, ScriptedTransport,
        SignatureVerifier, StaticAuthenticator, StaticProcessor, Stores, WebhookSubscription,
        processor::Payer,
    };
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    struct TestApp {
        store: Arc<MemoryStore>,
        transport: Arc<ScriptedTransport>,
        state: AppState,
    }

    fn test_app(processor: Option<StaticProcessor>) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::always_ok());
        let stores = Stores::from_backend(store.clone());
        let relay = RelaySender::new(transport.clone(), stores.delivery_logs.clone());

        let processor: Option<Arc<dyn PaymentProcessor>> =
            processor.map(|p| Arc::new(p) as Arc<dyn PaymentProcessor>);
        let reconciler = processor
            .clone()
            .map(|p| Arc::new(Reconciler::new(p, stores.clone(), relay.clone())));

        let authenticator = StaticAuthenticator::new().with_user(
            "good-token",
            AuthenticatedUser {
                user_id: "user-1".into(),
                email: Some("a@b.com".into()),
            },
        );

        let state = AppState {
            config: Arc::new(RelayConfig::default()),
            stores,
            processor,
            reconciler,
            manual_test: Arc::new(ManualTestTrigger::new(relay)),
            authenticator: Arc::new(authenticator),
            verifier: None,
        };

        TestApp {
            store,
            transport,
            state,
        }
    }

    fn approved(id: &str) -> ProcessorPayment {
        ProcessorPayment {
            id: id.into(),
            status: "approved".into(),
            payer: Some(Payer { email: Some("a@b.com".into()) }),
            transaction_amount: Some(dec!(39.0)),
            payment_type_id: Some("credit_card".into()),
            payment_method_id: None,
            external_reference: None,
        }
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let app = test_app(None);
        let request = Request::options("/webhook/payment")
            .header("origin", "https://app.example")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type,apikey")
            .body(Body::empty())
            .unwrap();

        let response = router(app.state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_non_payment_acknowledged() {
        let app = test_app(Some(StaticProcessor::new()));
        let (status, body) = send(
            app.state,
            post_json("/webhook/payment", &serde_json::json!({ "type": "merchant_order", "data": { "id": "1" } })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(app.store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_payment_id_is_400() {
        let app = test_app(Some(StaticProcessor::new()));
        let (status, body) = send(
            app.state,
            post_json("/webhook/payment", &serde_json::json!({ "type": "payment", "data": {} })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Payment ID not found");
        assert_eq!(app.store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = test_app(Some(StaticProcessor::new()));
        let request = Request::post("/webhook/payment")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app.state, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_processor_token_is_500() {
        let app = test_app(None);
        let (status, body) = send(
            app.state,
            post_json("/webhook/payment", &serde_json::json!({ "type": "payment", "data": { "id": "PMT1" } })),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_upstream_failure_status_surfaced() {
        let app = test_app(Some(StaticProcessor::failing(503, "maintenance")));
        let (status, body) = send(
            app.state,
            post_json("/webhook/payment", &serde_json::json!({ "type": "payment", "data": { "id": "PMT1" } })),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Failed to fetch payment");
    }

    #[tokio::test]
    async fn test_approved_payment_end_to_end() {
        let app = test_app(Some(StaticProcessor::new().with_payment(approved("PMT1"))));
        app.store.insert_profile(Profile {
            user_id: "user-1".into(),
            email: "a@b.com".into(),
            is_premium: false,
        });
        app.store.insert_subscription(WebhookSubscription {
            user_id: "user-1".into(),
            webhook_url: "https://buyer.example/hook".into(),
            is_active: true,
        });

        let (status, body) = send(
            app.state,
            post_json("/webhook/payment", &serde_json::json!({ "type": "payment", "data": { "id": "PMT1" } })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "success": true }));
        assert!(app.store.profile("user-1").unwrap().is_premium);
        assert_eq!(app.transport.requests()[0].1["event_type"], "payment_success");
    }

    #[tokio::test]
    async fn test_signature_enforced_when_configured() {
        let mut app = test_app(Some(StaticProcessor::new().with_payment(approved("PMT1"))));
        let verifier = SignatureVerifier::new("secret");
        let signature = verifier.sign("1700000000", Some("req-1"), "PMT1").unwrap();
        app.state.verifier = Some(verifier);

        let notification = serde_json::json!({ "type": "payment", "data": { "id": "PMT1" } });

        let (status, _) = send(app.state.clone(), post_json("/webhook/payment", &notification)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.store.payment_count(), 0);

        let mut request = post_json("/webhook/payment", &notification);
        request.headers_mut().insert("x-signature", signature.parse().unwrap());
        request.headers_mut().insert("x-request-id", "req-1".parse().unwrap());
        let (status, _) = send(app.state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.store.payment_count(), 1);
    }

    #[tokio::test]
    async fn test_manual_test_requires_auth() {
        let app = test_app(None);
        let (status, _) = send(
            app.state,
            post_json("/api/webhook/test", &serde_json::json!({ "webhook_url": "https://x.test/hook" })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(app.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_manual_test_reports_outcome() {
        let app = test_app(None);
        let mut request = post_json(
            "/api/webhook/test",
            &serde_json::json!({ "webhook_url": "https://x.test/hook" }),
        );
        request
            .headers_mut()
            .insert("authorization", "Bearer good-token".parse().unwrap());

        let (status, body) = send(app.state.clone(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], 200);
        assert_eq!(body["response"], "ok");
        assert_eq!(app.store.log_entries().len(), 1);

        let request = Request::get("/api/webhook/logs")
            .header("authorization", "Bearer good-token")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app.state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["source"], "manual_test");
    }

    #[tokio::test]
    async fn test_manual_test_rejects_bad_url() {
        let app = test_app(None);
        let mut request = post_json("/api/webhook/test", &serde_json::json!({ "webhook_url": "nope" }));
        request
            .headers_mut()
            .insert("authorization", "Bearer good-token".parse().unwrap());

        let (status, _) = send(app.state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_health_reports_missing_processor() {
        let app = test_app(None);
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(app.state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["services"]["processor"], false);
        assert!(!body["warnings"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_without_processor_is_500() {
        let app = test_app(None);
        let request = Request::post("/api/processor/probe").body(Body::empty()).unwrap();
        let (status, body) = send(app.state, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_probe_rejected_token_reports_details() {
        let app = test_app(Some(StaticProcessor::failing(401, "invalid access token")));
        let request = Request::post("/api/processor/probe").body(Body::empty()).unwrap();
        let (status, body) = send(app.state, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Token invalid or lacking permissions");
        assert_eq!(body["details"], "invalid access token");
    }

    #[tokio::test]
    async fn test_probe_accepted_token() {
        let app = test_app(Some(StaticProcessor::new()));
        let request = Request::post("/api/processor/probe").body(Body::empty()).unwrap();
        let (status, body) = send(app.state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body.get("details").is_none());
    }
}

//! HTTP-level tests over the full router.
//!
//! Runs the real router with in-memory stores, an in-memory session store,
//! and a recording payment gateway, driving the buyer flow end to end:
//! browse, cart, checkout, signed webhook, order lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use covey_shop::models::NewKit;
use covey_shop::notify::LogNotifier;
use covey_shop::payments::{
    CreateSessionRequest, GatewaySession, PaymentError, PaymentGateway, SignatureVerifier,
    signature,
};
use covey_shop::routes;
use covey_shop::state::AppState;
use covey_shop::stores::memory::{MemoryCarts, MemoryCatalog, MemoryOrders};
use covey_shop::stores::{CartStore, CatalogStore, OrderStore};

const WEBHOOK_SECRET: &str = "whsec_k4qQ9mZx27TbV5nR8pLwY3cF6hJdS1aG";

/// Gateway double that records session requests and refunds.
#[derive(Default)]
struct RecordingGateway {
    sessions: Mutex<Vec<CreateSessionRequest>>,
    refunds: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<GatewaySession, PaymentError> {
        let mut sessions = self.sessions.lock().expect("lock");
        sessions.push(request);
        Ok(GatewaySession {
            id: format!("cs_{}", sessions.len()),
            redirect_url: "https://pay.example/cs".to_owned(),
        })
    }

    async fn refund(&self, payment_id: &str) -> Result<(), PaymentError> {
        self.refunds.lock().expect("lock").push(payment_id.to_owned());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    catalog: Arc<MemoryCatalog>,
    gateway: Arc<RecordingGateway>,
    /// Session cookie carried across requests, like a browser would.
    cookie: Option<String>,
}

impl TestApp {
    fn new() -> Self {
        let catalog = Arc::new(MemoryCatalog::new());
        let carts = Arc::new(MemoryCarts::new());
        let orders = Arc::new(MemoryOrders::new());
        let gateway = Arc::new(RecordingGateway::default());

        let state = AppState::from_parts(
            "https://shop.example".to_owned(),
            Arc::clone(&catalog) as Arc<dyn CatalogStore>,
            carts as Arc<dyn CartStore>,
            orders as Arc<dyn OrderStore>,
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
            Arc::new(LogNotifier),
            SignatureVerifier::new(SecretString::from(WEBHOOK_SECRET)),
        );

        let router = routes::routes()
            .layer(SessionManagerLayer::new(MemoryStore::default()))
            .with_state(state);

        Self {
            router,
            catalog,
            gateway,
            cookie: None,
        }
    }

    async fn seed_kit(&self, name: &str, cents: i64, quantity: i32) -> i64 {
        self.catalog
            .create(NewKit {
                name: name.to_owned(),
                price: Decimal::new(cents, 2),
                quantity,
                active: true,
            })
            .await
            .expect("seed kit")
            .id
            .as_i64()
    }

    async fn request(&mut self, method: &str, uri: &str, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call");

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let raw = set_cookie.to_str().expect("cookie header").to_owned();
            let pair = raw.split(';').next().expect("cookie pair").to_owned();
            self.cookie = Some(pair);
        }

        response
    }

    async fn webhook(&mut self, payload: &Value) -> Response<Body> {
        let bytes = payload.to_string().into_bytes();
        let now = chrono::Utc::now().timestamp();
        let header_value = signature::sign(WEBHOOK_SECRET, &bytes, now);

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Payment-Signature", header_value)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router call")
    }

    fn succeeded_payload(&self, session_id: &str) -> Value {
        let sessions = self.gateway.sessions.lock().expect("lock");
        let metadata: HashMap<String, String> = sessions
            .iter()
            .enumerate()
            .find(|(i, _)| format!("cs_{}", i + 1) == session_id)
            .map(|(_, s)| s.metadata.clone())
            .expect("session recorded");
        json!({
            "event": "payment.succeeded",
            "session_id": session_id,
            "payment_id": format!("pay_{session_id}"),
            "metadata": metadata,
        })
    }
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn address() -> Value {
    json!({
        "recipient": "Jo Doe",
        "street": "1 Farm Rd",
        "city": "Plainfield",
        "postal_code": "12345",
        "country": "US"
    })
}

#[tokio::test]
async fn test_catalog_hides_inactive_kits() {
    let mut app = TestApp::new();
    let visible = app.seed_kit("Quail Starter Kit", 4999, 10).await;
    let hidden = app
        .catalog
        .create(NewKit {
            name: "Retired Kit".to_owned(),
            price: Decimal::new(1000, 2),
            quantity: 5,
            active: false,
        })
        .await
        .expect("seed")
        .id
        .as_i64();

    let response = app.request("GET", "/kits", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let ids: Vec<i64> = body
        .as_array()
        .expect("array")
        .iter()
        .map(|k| k["id"].as_i64().expect("id"))
        .collect();
    assert!(ids.contains(&visible));
    assert!(!ids.contains(&hidden));

    let response = app
        .request("GET", &format!("/kits/{hidden}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cart_round_trip_with_session_cookie() {
    let mut app = TestApp::new();
    let kit = app.seed_kit("Quail Starter Kit", 4999, 10).await;

    let response = app
        .request("POST", "/cart/items", Some(json!({"kit_id": kit, "quantity": 2})))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Same session: the cart persists across requests.
    let response = app.request("GET", "/cart", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["item_count"], 2);
    assert_eq!(body["lines"][0]["kit_id"], kit);

    let line_id = body["lines"][0]["id"].as_i64().expect("line id");
    let response = app
        .request(
            "PATCH",
            &format!("/cart/items/{line_id}"),
            Some(json!({"quantity": 5})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["item_count"], 5);

    let response = app.request("DELETE", "/cart", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.request("GET", "/cart", None).await;
    let body = json_body(response).await;
    assert_eq!(body["item_count"], 0);
}

#[tokio::test]
async fn test_add_item_conflict_and_validation_statuses() {
    let mut app = TestApp::new();
    let kit = app.seed_kit("Quail Starter Kit", 4999, 2).await;

    let response = app
        .request("POST", "/cart/items", Some(json!({"kit_id": kit, "quantity": 3})))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request("POST", "/cart/items", Some(json!({"kit_id": kit, "quantity": 0})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request("POST", "/cart/items", Some(json!({"kit_id": 999, "quantity": 1})))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_full_purchase_flow() {
    let mut app = TestApp::new();
    let kit = app.seed_kit("Quail Starter Kit", 4999, 10).await;

    app.request("POST", "/cart/items", Some(json!({"kit_id": kit, "quantity": 2})))
        .await;

    let response = app
        .request(
            "POST",
            "/checkout",
            Some(json!({"shipping_address": address()})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let session_id = body["session_id"].as_str().expect("session id").to_owned();
    assert_eq!(body["redirect_url"], "https://pay.example/cs");

    // Before the webhook lands, the landing page reports pending.
    let response = app
        .request("GET", &format!("/checkout/success/{session_id}"), None)
        .await;
    let body = json_body(response).await;
    assert_eq!(body["status"], "pending");

    // Gateway reports success.
    let payload = app.succeeded_payload(&session_id);
    let response = app.webhook(&payload).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["received"], true);

    // Stock is decremented exactly once even if the gateway redelivers.
    let response = app.webhook(&payload).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = app
        .catalog
        .get(covey_core::KitId::new(kit))
        .await
        .expect("get")
        .expect("kit");
    assert_eq!(stored.quantity, 8);
    assert!(app.gateway.refunds.lock().expect("lock").is_empty());

    // The landing page now shows the order, and the cart is gone.
    let response = app
        .request("GET", &format!("/checkout/success/{session_id}"), None)
        .await;
    let body = json_body(response).await;
    assert_eq!(body["status"], "complete");
    assert_eq!(body["order"]["status"], "PAID");
    assert_eq!(body["order"]["total"], "112.48");

    let response = app.request("GET", "/cart", None).await;
    let body = json_body(response).await;
    assert_eq!(body["item_count"], 0);
}

#[tokio::test]
async fn test_webhook_refunds_when_stock_lost_after_checkout() {
    let mut app = TestApp::new();
    let kit = app.seed_kit("Quail Starter Kit", 4999, 2).await;

    app.request("POST", "/cart/items", Some(json!({"kit_id": kit, "quantity": 2})))
        .await;
    let response = app
        .request(
            "POST",
            "/checkout",
            Some(json!({"shipping_address": address()})),
        )
        .await;
    let body = json_body(response).await;
    let session_id = body["session_id"].as_str().expect("session id").to_owned();

    // Stock disappears between checkout and webhook.
    app.catalog
        .reserve(covey_core::KitId::new(kit), 2)
        .await
        .expect("competitor takes the stock");

    let payload = app.succeeded_payload(&session_id);
    let response = app.webhook(&payload).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        app.gateway.refunds.lock().expect("lock").as_slice(),
        [format!("pay_{session_id}")]
    );
    let response = app
        .request("GET", &format!("/checkout/success/{session_id}"), None)
        .await;
    let body = json_body(response).await;
    assert_eq!(body["status"], "pending", "no order was created");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let mut app = TestApp::new();
    let payload = json!({"event": "payment.succeeded", "session_id": "cs_x"});
    let bytes = payload.to_string().into_bytes();
    let now = chrono::Utc::now().timestamp();
    let header_value = signature::sign("whsec_wrong_secret_q1W2e3R4t5Y6u7I8", &bytes, now);

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("Payment-Signature", header_value)
        .body(Body::from(bytes))
        .expect("request");
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router call");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing header entirely is also a 400.
    let response = app
        .request("POST", "/webhook", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_requires_valid_address() {
    let mut app = TestApp::new();
    let kit = app.seed_kit("Quail Starter Kit", 4999, 10).await;
    app.request("POST", "/cart/items", Some(json!({"kit_id": kit, "quantity": 1})))
        .await;

    let mut bad = address();
    bad["postal_code"] = json!("1234");
    let response = app
        .request("POST", "/checkout", Some(json!({"shipping_address": bad})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_without_a_cart_is_not_found() {
    let mut app = TestApp::new();
    let response = app
        .request(
            "POST",
            "/checkout",
            Some(json!({"shipping_address": address()})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_orders_and_admin_require_auth() {
    let mut app = TestApp::new();

    let response = app.request("GET", "/orders", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.request("GET", "/admin/kits", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.request("GET", "/admin/orders", None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

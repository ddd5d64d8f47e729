mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bookstore_orders::http::{self, AppState, Role, TokenKeys};
use bookstore_orders::publisher::EventPublisher;
use bookstore_orders::store::OrderStore;
use common::{Fixture, ScriptedGateway, CALLBACK_URL};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &[u8] = b"test-secret-test-secret-test-secret!";

struct Api {
    app: Router,
    tokens: TokenKeys,
    fx: Fixture,
}

impl Api {
    fn new() -> Self {
        let fx = Fixture::new();
        let tokens = TokenKeys::new(SECRET, chrono::Duration::minutes(5));
        let store: Arc<dyn OrderStore> = Arc::new(fx.store.clone());
        let gateway = Arc::new(ScriptedGateway::default());
        let state = AppState::new(store, gateway, EventPublisher::disabled(), tokens.clone(), CALLBACK_URL);
        Self { app: http::router(state, Duration::from_secs(5)), tokens, fx }
    }

    fn bearer(&self, user: Uuid, role: Role) -> String {
        format!("Bearer {}", self.tokens.issue(user, role).unwrap())
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let location = resp.headers().get(header::LOCATION).map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body, location)
    }

    async fn call(&self, method: &str, uri: &str, auth: Option<String>, body: Option<Value>) -> (StatusCode, Value, Option<String>) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            req = req.header(header::AUTHORIZATION, auth);
        }
        let req = match body {
            Some(body) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        };
        self.send(req.unwrap()).await
    }
}

#[tokio::test]
async fn test_health() {
    let api = Api::new();
    let (status, body, _) = api.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_authentication_rejections() {
    let api = Api::new();
    let user = api.fx.user().await;

    let (status, body, _) = api.call("GET", "/user/order", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "UNAUTHORIZED");

    let req = Request::get("/user/promo").header(header::COOKIE, "refresh_token=r1").body(Body::empty()).unwrap();
    let (status, _, location) = api.send(req).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location.as_deref(), Some("/user/login?next=%2Fuser%2Fpromo"));

    let (status, _, _) = api.call("GET", "/admin/order", Some(api.bearer(user, Role::User)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let req = Request::get("/admin/order/date?from=a&to=b").header(header::COOKIE, "refresh_token=r1").body(Body::empty()).unwrap();
    let (status, _, location) = api.send(req).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location.as_deref(), Some("/admin/login?next=%2Fadmin%2Forder%2Fdate%3Ffrom%3Da%26to%3Db"));
    let (status, _, _) = api.call("GET", "/admin/order", Some("Bearer not-a-token".into()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_item_and_error_bodies() {
    let api = Api::new();
    let user = api.fx.user().await;
    let book = api.fx.digital_book().await;
    let auth = api.bearer(user, Role::User);

    let (status, body, _) = api.call("POST", "/user/order/item", Some(auth.clone()), Some(json!({"book_id": book, "kind": 0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["total"], 45_000);
    assert_eq!(body["order"]["status"], 0);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (status, body, _) = api.call("POST", "/user/order/item", Some(auth.clone()), Some(json!({"book_id": book, "kind": 0}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "CONFLICT");

    let (status, body, _) = api.call("POST", "/user/order/item", Some(auth.clone()), Some(json!({"book_id": book, "kind": 7}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_INPUT");

    let (status, body, _) = api.call("POST", "/user/order/item", Some(auth.clone()), Some(json!({"book_id": book, "kind": 1, "quantity": 1}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "FORBIDDEN");

    let (status, body, _) = api.call("POST", "/user/order/item", Some(auth.clone()), Some(json!({"book_id": Uuid::new_v4(), "kind": 0}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");

    let (status, _, _) = api.call("GET", "/user/order/status/9", Some(auth.clone()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body, _) = api.call("GET", "/user/order/status/0", Some(auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_over_http() {
    let api = Api::new();
    let (user, phone, address) = api.fx.shipping_user().await;
    let admin = Uuid::new_v4();
    let book = api.fx.bundle_book().await;
    let auth = api.bearer(user, Role::User);
    let admin_auth = api.bearer(admin, Role::Admin);

    let (_, cart, _) = api.call("POST", "/user/order/item", Some(auth.clone()), Some(json!({"book_id": book, "kind": 2, "quantity": 2}))).await;
    let oid = cart["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(cart["order"]["total"], 190_000);

    let (status, body, _) = api.call("POST", &format!("/user/order/{oid}/payment/zarinpal"), Some(auth.clone()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "INVALID_STATE_TRANSITION");

    let (status, _, _) = api.call("PATCH", &format!("/user/order/{oid}/phone"), Some(auth.clone()), Some(json!({"phone_id": phone}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = api.call("PATCH", &format!("/user/order/{oid}/address"), Some(auth.clone()), Some(json!({"address_id": address}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, location) = api.call("POST", &format!("/user/order/{oid}/payment/zarinpal"), Some(auth.clone()), None).await;
    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    let authority = body["authority"].as_str().unwrap().to_string();
    assert_eq!(location, Some(format!("https://sandbox.zarinpal.com/pg/StartPay/{authority}")));

    let check = format!("/payment/zarinpal/check?Authority={authority}&Status=OK");
    let (status, body, _) = api.call("GET", &check, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], 190_000);
    let (status, body, _) = api.call("GET", &check, None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "CONFLICT");

    let (status, body, _) = api.call("PATCH", &format!("/admin/order/{oid}/status"), Some(admin_auth.clone()), Some(json!({"status": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 2);
    let (status, _, _) = api.call("PATCH", &format!("/admin/order/{oid}/stn"), Some(admin_auth.clone()), Some(json!({"stn": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = api.call("PATCH", &format!("/admin/order/{oid}/stn"), Some(admin_auth.clone()), Some(json!({"stn": "TRK-9"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body, _) = api.call("PATCH", &format!("/admin/order/{oid}/status"), Some(admin_auth.clone()), Some(json!({"status": 3}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stn"], "TRK-9");

    let (status, body, _) = api.call("GET", "/admin/order/status/3", Some(admin_auth.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (status, _, _) = api.call("DELETE", &format!("/admin/order/{oid}"), Some(admin_auth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_promo_routes() {
    let api = Api::new();
    let admin = api.fx.user().await;
    let customer = api.fx.user().await;
    let admin_auth = api.bearer(admin, Role::Admin);
    let expires = (chrono::Utc::now() + chrono::Duration::days(3)).to_rfc3339();

    let (status, body, _) = api.call("POST", "/admin/promo", Some(admin_auth.clone()),
        Some(json!({"code": "ZERO", "expires_at": expires, "limit": 1, "percentage": 0}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "PROMO_UNUSABLE");

    let (status, promo, _) = api.call("POST", "/admin/promo", Some(admin_auth.clone()),
        Some(json!({"code": "WELCOME", "expires_at": expires, "limit": 10, "percentage": 15, "max_discount": 20000}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let pid = promo["id"].as_str().unwrap().to_string();

    let (status, _, _) = api.call("POST", &format!("/admin/promo/{pid}/grant"), Some(admin_auth.clone()), Some(json!({"user_id": customer}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body, _) = api.call("GET", "/user/promo", Some(api.bearer(customer, Role::User)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["code"], "WELCOME");

    let (status, body, _) = api.call("GET", "/admin/promo", Some(admin_auth.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (status, _, _) = api.call("DELETE", &format!("/admin/promo/{pid}"), Some(admin_auth.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = api.call("DELETE", &format!("/admin/promo/{pid}"), Some(admin_auth), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_date_listing() {
    let api = Api::new();
    let user = api.fx.user().await;
    let admin_auth = api.bearer(Uuid::new_v4(), Role::Admin);
    let book = api.fx.digital_book().await;
    api.call("POST", "/user/order/item", Some(api.bearer(user, Role::User)), Some(json!({"book_id": book, "kind": 0}))).await;

    let now = chrono::Utc::now();
    let from = (now - chrono::Duration::hours(1)).format("%Y-%m-%dT%H:%M:%SZ");
    let to = (now + chrono::Duration::hours(1)).format("%Y-%m-%dT%H:%M:%SZ");
    let (status, body, _) = api.call("GET", &format!("/admin/order/date?from={from}&to={to}"), Some(admin_auth.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (status, body, _) = api.call("GET", &format!("/admin/order/date/status/1?from={from}&to={to}"), Some(admin_auth.clone()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
    let (status, _, _) = api.call("GET", &format!("/admin/order/date?from={to}&to={from}"), Some(admin_auth), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_path_and_query_get_json_errors() {
    let api = Api::new();
    let user = api.fx.user().await;
    let auth = api.bearer(user, Role::User);
    let admin_auth = api.bearer(Uuid::new_v4(), Role::Admin);

    let (status, body, _) = api.call("GET", "/user/order/status/abc", Some(auth.clone()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_INPUT");
    assert!(body["message"].is_string());

    let (status, body, _) = api.call("GET", "/admin/order/date", Some(admin_auth.clone()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_INPUT");

    let (status, body, _) = api.call("PATCH", "/user/order/not-a-uuid/phone", Some(auth.clone()), Some(json!({"phone_id": Uuid::new_v4()}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_router_errors_get_json_bodies() {
    let api = Api::new();

    let (status, body, _) = api.call("GET", "/no/such/route", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NOT_FOUND");

    let (status, body, _) = api.call("PUT", "/health", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["kind"], "METHOD_NOT_ALLOWED");
}

//! HTTP surface: customer, administrator and gateway routes

pub mod admin;
pub mod auth;
pub mod error;
pub mod payment;
pub mod user;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use validator::Validate;

use crate::gateway::PaymentGateway;
use crate::publisher::EventPublisher;
use crate::services::{CartManager, OrderLifecycle, OrderQueries, PaymentCoordinator, PromoEngine};
use crate::store::OrderStore;
use crate::OrderError;
use error::ErrorBody;

pub use auth::{Admin, Customer, Role, TokenKeys};

#[derive(Clone)]
pub struct AppState {
    pub cart: CartManager,
    pub promos: PromoEngine,
    pub lifecycle: OrderLifecycle,
    pub payments: PaymentCoordinator,
    pub queries: OrderQueries,
    pub tokens: TokenKeys,
}

impl AppState {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventPublisher,
        tokens: TokenKeys,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            cart: CartManager::new(store.clone(), events.clone()),
            promos: PromoEngine::new(store.clone(), events.clone()),
            lifecycle: OrderLifecycle::new(store.clone(), events.clone()),
            payments: PaymentCoordinator::new(store.clone(), gateway, events, callback_url),
            queries: OrderQueries::new(store),
            tokens,
        }
    }
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "bookstore-orders"})) }))
        // customer
        .route("/user/order", get(user::list_orders))
        .route("/user/order/status/:code", get(user::list_orders_by_status))
        .route("/user/order/item", post(user::add_item))
        .route("/user/order/:oid", get(user::get_order))
        .route("/user/order/:oid/item", get(user::list_items))
        .route("/user/order/:oid/item/:iid", delete(user::remove_item))
        .route("/user/order/:oid/item/:iid/inc", patch(user::increase_quantity))
        .route("/user/order/:oid/item/:iid/dec", patch(user::decrease_quantity))
        .route("/user/order/:oid/promo", patch(user::apply_promo).delete(user::remove_promo))
        .route("/user/order/:oid/phone", patch(user::set_phone))
        .route("/user/order/:oid/address", patch(user::set_address))
        .route("/user/order/:oid/payment/zarinpal", post(payment::initiate))
        .route("/user/promo", get(user::list_promos))
        .route("/user/dashboard/digital", get(user::digital_library))
        .route("/user/dashboard/download/:book_id", get(user::download))
        // gateway
        .route("/payment/zarinpal/check", get(payment::callback))
        // admin
        .route("/admin/order", get(admin::list_orders))
        .route("/admin/order/status/:code", get(admin::list_orders_by_status))
        .route("/admin/order/date", get(admin::list_orders_by_date))
        .route("/admin/order/date/status/:code", get(admin::list_orders_by_date_and_status))
        .route("/admin/order/:oid", delete(admin::delete_order))
        .route("/admin/order/:oid/status", patch(admin::set_status))
        .route("/admin/order/:oid/stn", patch(admin::set_stn))
        .route("/admin/promo", get(admin::list_promos).post(admin::create_promo))
        .route("/admin/promo/order/:oid", get(admin::promo_of_order))
        .route("/admin/promo/:id", delete(admin::delete_promo))
        .route("/admin/promo/:id/grant", post(admin::grant_promo))
        .fallback(|| async { OrderError::NotFound("route") })
        .layer(TimeoutLayer::new(request_timeout))
        .layer(map_response(error_body))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

/// JSON body that passed its `validator` rules.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = OrderError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await
            .map_err(|e| OrderError::InvalidInput(e.body_text()))?;
        value.validate().map_err(|e| OrderError::InvalidInput(e.to_string()))?;
        Ok(Self(value))
    }
}

/// Path parameters; a malformed segment is `InvalidInput`.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = OrderError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await
            .map_err(|e| OrderError::InvalidInput(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string; a missing or malformed field is `InvalidInput`.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = OrderError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await
            .map_err(|e| OrderError::InvalidInput(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Errors answered by the router or the middleware themselves (unknown route,
/// wrong method, request deadline) come without a body; give them the same
/// `{kind, message}` shape handlers use.
async fn error_body(response: Response) -> Response {
    let status = response.status();
    let json = response.headers().get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if json || !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let kind = match status {
        StatusCode::REQUEST_TIMEOUT => "TIMEOUT",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        s if s.is_server_error() => "INTERNAL",
        _ => "INVALID_INPUT",
    };
    let message = status.canonical_reason().unwrap_or("Request failed").to_string();
    (status, Json(ErrorBody { kind, message })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn json_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_timeout_gets_json_body() {
        let response = error_body(StatusCode::REQUEST_TIMEOUT.into_response()).await;

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body = json_of(response).await;
        assert_eq!(body["kind"], "TIMEOUT");
        assert_eq!(body["message"], "Request Timeout");
    }

    #[tokio::test]
    async fn test_handler_bodies_pass_through() {
        let response = error_body(OrderError::Conflict("taken".into()).into_response()).await;
        assert_eq!(json_of(response).await["kind"], "CONFLICT");

        let ok = error_body(StatusCode::OK.into_response()).await;
        assert_eq!(ok.status(), StatusCode::OK);
    }
}

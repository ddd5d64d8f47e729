//! Payment initiation and the gateway callback

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiPath, ApiQuery, AppState, Customer};
use crate::services::PaymentOutcome;
use crate::OrderError;

/// Sends the customer to the gateway's payment page with a permanent redirect.
pub async fn initiate(State(s): State<AppState>, Customer(user): Customer, ApiPath(oid): ApiPath<Uuid>) -> Result<Response, OrderError> {
    let redirect = s.payments.initiate(user, oid).await?;
    Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, redirect.url.clone())], Json(redirect)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(rename = "Authority")]
    pub authority: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

pub async fn callback(State(s): State<AppState>, ApiQuery(p): ApiQuery<CallbackParams>) -> Result<Json<PaymentOutcome>, OrderError> {
    Ok(Json(s.payments.callback(p.authority.as_deref(), p.status.as_deref()).await?))
}

//! Administrator routes

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{Admin, ApiPath, ApiQuery, AppState, ValidJson};
use crate::domain::value_objects::OrderStatus;
use crate::store::OrderFilter;
use crate::{NewPromo, Order, OrderError, Promo};

type ApiResult<T> = Result<Json<T>, OrderError>;

#[derive(Debug, Deserialize, Validate)] pub struct StatusBody { pub status: OrderStatus }

#[derive(Debug, Deserialize, Validate)]
pub struct StnBody {
    #[validate(length(min = 1, max = 128))]
    pub stn: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePromoBody {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub limit: u32,
    pub percentage: u8,
    pub max_discount: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)] pub struct GrantBody { pub user_id: Uuid }

#[derive(Debug, Deserialize)] pub struct DateRange { pub from: DateTime<Utc>, pub to: DateTime<Utc> }

pub async fn set_status(State(s): State<AppState>, _: Admin, ApiPath(oid): ApiPath<Uuid>, ValidJson(b): ValidJson<StatusBody>) -> ApiResult<Order> {
    Ok(Json(s.lifecycle.set_status(oid, b.status).await?))
}

pub async fn set_stn(State(s): State<AppState>, _: Admin, ApiPath(oid): ApiPath<Uuid>, ValidJson(b): ValidJson<StnBody>) -> ApiResult<Order> {
    Ok(Json(s.lifecycle.set_stn(oid, &b.stn).await?))
}

pub async fn delete_order(State(s): State<AppState>, _: Admin, ApiPath(oid): ApiPath<Uuid>) -> Result<StatusCode, OrderError> {
    s.lifecycle.delete_order(oid).await?;
    Ok(StatusCode::OK)
}

pub async fn list_orders(State(s): State<AppState>, _: Admin) -> ApiResult<Vec<Order>> {
    Ok(Json(s.queries.list(Default::default()).await?))
}

pub async fn list_orders_by_status(State(s): State<AppState>, _: Admin, ApiPath(code): ApiPath<i16>) -> ApiResult<Vec<Order>> {
    let status = OrderStatus::try_from(code)?;
    Ok(Json(s.queries.list(OrderFilter { status: Some(status), ..Default::default() }).await?))
}

pub async fn list_orders_by_date(State(s): State<AppState>, _: Admin, ApiQuery(r): ApiQuery<DateRange>) -> ApiResult<Vec<Order>> {
    Ok(Json(s.queries.by_date(r.from, r.to, None).await?))
}

pub async fn list_orders_by_date_and_status(State(s): State<AppState>, _: Admin, ApiPath(code): ApiPath<i16>, ApiQuery(r): ApiQuery<DateRange>) -> ApiResult<Vec<Order>> {
    let status = OrderStatus::try_from(code)?;
    Ok(Json(s.queries.by_date(r.from, r.to, Some(status)).await?))
}

pub async fn create_promo(State(s): State<AppState>, Admin(owner): Admin, ValidJson(b): ValidJson<CreatePromoBody>) -> Result<(StatusCode, Json<Promo>), OrderError> {
    let promo = NewPromo::new(&b.code, b.expires_at, b.limit, b.percentage, b.max_discount)?;
    Ok((StatusCode::CREATED, Json(s.promos.create_promo(owner, promo).await?)))
}

pub async fn grant_promo(State(s): State<AppState>, _: Admin, ApiPath(id): ApiPath<Uuid>, ValidJson(b): ValidJson<GrantBody>) -> Result<StatusCode, OrderError> {
    s.promos.grant_promo(id, b.user_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn delete_promo(State(s): State<AppState>, _: Admin, ApiPath(id): ApiPath<Uuid>) -> Result<StatusCode, OrderError> {
    s.promos.delete_promo(id).await?;
    Ok(StatusCode::OK)
}

pub async fn list_promos(State(s): State<AppState>, _: Admin) -> ApiResult<Vec<Promo>> {
    Ok(Json(s.promos.list_all().await?))
}

pub async fn promo_of_order(State(s): State<AppState>, _: Admin, ApiPath(oid): ApiPath<Uuid>) -> ApiResult<Option<Promo>> {
    Ok(Json(s.promos.promo_of_order(oid).await?))
}

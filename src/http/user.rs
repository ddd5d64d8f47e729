//! Customer routes

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{ApiPath, AppState, Customer, ValidJson};
use crate::domain::aggregates::cart::Cart;
use crate::domain::value_objects::{OrderStatus, RequestedKind};
use crate::services::{AddItem, DigitalCopy};
use crate::{LineItem, Order, OrderError, Promo};

type ApiResult<T> = Result<Json<T>, OrderError>;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemBody {
    pub book_id: Uuid,
    pub kind: RequestedKind,
    #[serde(default = "one")]
    #[validate(range(max = 1000))]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct PromoBody {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)] pub struct PhoneBody { pub phone_id: Uuid }
#[derive(Debug, Deserialize, Validate)] pub struct AddressBody { pub address_id: Uuid }

pub async fn add_item(State(s): State<AppState>, Customer(user): Customer, ValidJson(b): ValidJson<AddItemBody>) -> ApiResult<Cart> {
    Ok(Json(s.cart.add_item(user, AddItem { book_id: b.book_id, kind: b.kind, quantity: b.quantity }).await?))
}

pub async fn increase_quantity(State(s): State<AppState>, Customer(user): Customer, ApiPath((oid, iid)): ApiPath<(Uuid, Uuid)>) -> ApiResult<Cart> {
    Ok(Json(s.cart.increase_quantity(user, oid, iid).await?))
}

pub async fn decrease_quantity(State(s): State<AppState>, Customer(user): Customer, ApiPath((oid, iid)): ApiPath<(Uuid, Uuid)>) -> ApiResult<Cart> {
    Ok(Json(s.cart.decrease_quantity(user, oid, iid).await?))
}

pub async fn remove_item(State(s): State<AppState>, Customer(user): Customer, ApiPath((oid, iid)): ApiPath<(Uuid, Uuid)>) -> ApiResult<Cart> {
    Ok(Json(s.cart.remove_item(user, oid, iid).await?))
}

pub async fn list_items(State(s): State<AppState>, Customer(user): Customer, ApiPath(oid): ApiPath<Uuid>) -> ApiResult<Vec<LineItem>> {
    Ok(Json(s.cart.list_items(user, oid).await?))
}

pub async fn apply_promo(State(s): State<AppState>, Customer(user): Customer, ApiPath(oid): ApiPath<Uuid>, ValidJson(b): ValidJson<PromoBody>) -> ApiResult<Order> {
    Ok(Json(s.promos.apply_to_order(user, oid, &b.code).await?))
}

pub async fn remove_promo(State(s): State<AppState>, Customer(user): Customer, ApiPath(oid): ApiPath<Uuid>) -> ApiResult<Order> {
    Ok(Json(s.promos.remove_from_order(user, oid).await?))
}

pub async fn set_phone(State(s): State<AppState>, Customer(user): Customer, ApiPath(oid): ApiPath<Uuid>, ValidJson(b): ValidJson<PhoneBody>) -> ApiResult<Order> {
    Ok(Json(s.cart.set_phone(user, oid, b.phone_id).await?))
}

pub async fn set_address(State(s): State<AppState>, Customer(user): Customer, ApiPath(oid): ApiPath<Uuid>, ValidJson(b): ValidJson<AddressBody>) -> ApiResult<Order> {
    Ok(Json(s.cart.set_address(user, oid, b.address_id).await?))
}

pub async fn get_order(State(s): State<AppState>, Customer(user): Customer, ApiPath(oid): ApiPath<Uuid>) -> ApiResult<Cart> {
    Ok(Json(s.queries.get(oid, Some(user)).await?))
}

pub async fn list_orders(State(s): State<AppState>, Customer(user): Customer) -> ApiResult<Vec<Order>> {
    Ok(Json(s.queries.for_user(user, None).await?))
}

pub async fn list_orders_by_status(State(s): State<AppState>, Customer(user): Customer, ApiPath(code): ApiPath<i16>) -> ApiResult<Vec<Order>> {
    let status = OrderStatus::try_from(code)?;
    Ok(Json(s.queries.for_user(user, Some(status)).await?))
}

pub async fn list_promos(State(s): State<AppState>, Customer(user): Customer) -> ApiResult<Vec<Promo>> {
    Ok(Json(s.promos.list_for_user(user).await?))
}

pub async fn digital_library(State(s): State<AppState>, Customer(user): Customer) -> ApiResult<Vec<DigitalCopy>> {
    Ok(Json(s.queries.digital_library(user).await?))
}

pub async fn download(State(s): State<AppState>, Customer(user): Customer, ApiPath(book_id): ApiPath<Uuid>) -> ApiResult<DigitalCopy> {
    Ok(Json(s.queries.authorize_download(user, book_id).await?))
}

//! Order Store
//!
//! Every service operation runs inside one [`OrderTx`]. Reads observe a
//! consistent snapshot, writes become visible only on [`OrderTx::commit`], and
//! dropping an uncommitted transaction rolls it back.
//!
//! Two backends implement the contract: [`postgres::PgStore`] for production
//! and [`memory::MemoryStore`] for tests and standalone runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{GatewayReceipt, LineItem, Order, Promo};
use crate::domain::pricing::BookPrice;
use crate::domain::value_objects::{Availability, OrderStatus};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A book as the catalog exposes it to the order core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookListing {
    pub id: Uuid,
    pub title: String,
    pub availability: Availability,
    pub price: BookPrice,
    pub stock: u32,
    /// Location of the digital copy, when one exists.
    pub file: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub id: Uuid,
    pub user_id: Uuid,
    pub number: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
}

/// Selection used by the order listings. Empty filter selects everything.
#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.map_or(true, |u| order.user_id == u)
            && self.status.map_or(true, |s| order.status == s)
            && self.created_between.map_or(true, |(from, to)| order.created_at >= from && order.created_at <= to)
    }
}

/// Catalog contract consumed by the order core.
#[async_trait]
pub trait CatalogReader: Send {
    async fn book(&mut self, book_id: Uuid) -> Result<Option<BookListing>>;
}

/// Identity contract consumed by the order core.
#[async_trait]
pub trait IdentityReader: Send {
    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool>;
    async fn phone_of_user(&mut self, phone_id: Uuid) -> Result<Option<Phone>>;
    async fn address_of_user(&mut self, address_id: Uuid) -> Result<Option<Address>>;
    async fn email_of_user(&mut self, user_id: Uuid) -> Result<Option<String>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn OrderTx>>;
}

/// One unit of work against the store.
#[async_trait]
pub trait OrderTx: CatalogReader + IdentityReader {
    // orders
    /// Returns the user's CREATED order, inserting an empty one if none exists. Locked.
    async fn ensure_open_order(&mut self, user_id: Uuid) -> Result<(Order, bool)>;
    async fn order(&mut self, order_id: Uuid) -> Result<Option<Order>>;
    /// Loads and locks the order row for the rest of the transaction.
    async fn order_for_update(&mut self, order_id: Uuid) -> Result<Option<Order>>;
    async fn save_order(&mut self, order: &Order) -> Result<()>;
    async fn delete_order(&mut self, order_id: Uuid) -> Result<()>;
    async fn orders(&mut self, filter: &OrderFilter) -> Result<Vec<Order>>;

    // line items
    async fn items(&mut self, order_id: Uuid) -> Result<Vec<LineItem>>;
    /// Fails with `Conflict` on a second DIGITAL line for the same (order, book).
    async fn insert_item(&mut self, item: &LineItem) -> Result<()>;
    async fn update_item_quantity(&mut self, item_id: Uuid, quantity: u32) -> Result<()>;
    async fn delete_item(&mut self, item_id: Uuid) -> Result<()>;
    /// Books the user holds a DIGITAL line for in an order at or past PAID.
    async fn owned_digital_books(&mut self, user_id: Uuid) -> Result<Vec<Uuid>>;

    // stock
    /// Conditional decrement; fails with `InsufficientStock` when fewer than `quantity` remain.
    async fn take_stock(&mut self, book_id: Uuid, quantity: u32) -> Result<()>;
    async fn return_stock(&mut self, book_id: Uuid, quantity: u32) -> Result<()>;

    // promos
    /// Fails with `Conflict` when the code is taken.
    async fn insert_promo(&mut self, promo: &Promo) -> Result<()>;
    async fn grant_promo(&mut self, promo_id: Uuid, user_id: Uuid) -> Result<()>;
    async fn promo(&mut self, promo_id: Uuid) -> Result<Option<Promo>>;
    /// The promo with `code`, only if it has been granted to `user_id`. Locked.
    async fn granted_promo(&mut self, code: &str, user_id: Uuid) -> Result<Option<Promo>>;
    /// All promos, or only those granted to `user_id`.
    async fn promos(&mut self, user_id: Option<Uuid>) -> Result<Vec<Promo>>;
    async fn promo_in_use(&mut self, promo_id: Uuid) -> Result<bool>;
    async fn delete_promo(&mut self, promo_id: Uuid) -> Result<()>;
    /// Conditional decrement of the remaining limit; fails with `PromoUnusable`
    /// when the promo is exhausted or expired at `now`.
    async fn claim_promo(&mut self, promo_id: Uuid, now: DateTime<Utc>) -> Result<()>;
    async fn release_promo(&mut self, promo_id: Uuid) -> Result<()>;

    // gateway receipts
    /// Loads and locks the receipt carrying `authority`.
    async fn receipt_by_authority(&mut self, authority: &str) -> Result<Option<GatewayReceipt>>;
    async fn receipt_of_order(&mut self, order_id: Uuid) -> Result<Option<GatewayReceipt>>;
    /// Replaces the order's unverified receipt, if any, with `receipt`.
    /// Fails with `Conflict` when the authority is already recorded.
    async fn replace_receipt(&mut self, receipt: &GatewayReceipt) -> Result<()>;
    async fn save_receipt(&mut self, receipt: &GatewayReceipt) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

//! In-process store backend.
//!
//! Transactions work on a private copy of the tables while holding the single
//! store mutex, so units of work are fully serialized. Commit swaps the copy in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Address, BookListing, CatalogReader, IdentityReader, OrderFilter, OrderStore, OrderTx, Phone};
use crate::domain::aggregates::{GatewayReceipt, LineItem, Order, Promo};
use crate::domain::value_objects::{ItemKind, OrderStatus};
use crate::{OrderError, Result};

#[derive(Clone, Debug, Default)]
struct Tables {
    users: HashMap<Uuid, String>,
    phones: HashMap<Uuid, Phone>,
    addresses: HashMap<Uuid, Address>,
    books: HashMap<Uuid, BookListing>,
    orders: HashMap<Uuid, Order>,
    items: Vec<LineItem>,
    promos: HashMap<Uuid, Promo>,
    grants: HashSet<(Uuid, Uuid)>,
    receipts: Vec<GatewayReceipt>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn add_user(&self, email: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.tables.lock().await.users.insert(id, email.to_string());
        id
    }

    pub async fn add_phone(&self, user_id: Uuid, number: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.tables.lock().await.phones.insert(id, Phone { id, user_id, number: number.to_string() });
        id
    }

    pub async fn add_address(&self, user_id: Uuid) -> Uuid {
        let id = Uuid::now_v7();
        self.tables.lock().await.addresses.insert(id, Address { id, user_id });
        id
    }

    pub async fn add_book(&self, book: BookListing) -> Uuid {
        let id = book.id;
        self.tables.lock().await.books.insert(id, book);
        id
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn OrderTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl MemoryTx {
    fn order_mut(&mut self, order_id: Uuid) -> Result<&mut Order> {
        self.working.orders.get_mut(&order_id).ok_or(OrderError::NotFound("order"))
    }

    fn item_mut(&mut self, item_id: Uuid) -> Result<&mut LineItem> {
        self.working.items.iter_mut().find(|i| i.id == item_id).ok_or(OrderError::NotFound("item"))
    }

    fn book_mut(&mut self, book_id: Uuid) -> Result<&mut BookListing> {
        self.working.books.get_mut(&book_id).ok_or(OrderError::NotFound("book"))
    }

    fn promo_mut(&mut self, promo_id: Uuid) -> Result<&mut Promo> {
        self.working.promos.get_mut(&promo_id).ok_or(OrderError::NotFound("promo"))
    }
}

#[async_trait]
impl CatalogReader for MemoryTx {
    async fn book(&mut self, book_id: Uuid) -> Result<Option<BookListing>> {
        Ok(self.working.books.get(&book_id).cloned())
    }
}

#[async_trait]
impl IdentityReader for MemoryTx {
    async fn user_exists(&mut self, user_id: Uuid) -> Result<bool> {
        Ok(self.working.users.contains_key(&user_id))
    }

    async fn phone_of_user(&mut self, phone_id: Uuid) -> Result<Option<Phone>> {
        Ok(self.working.phones.get(&phone_id).cloned())
    }

    async fn address_of_user(&mut self, address_id: Uuid) -> Result<Option<Address>> {
        Ok(self.working.addresses.get(&address_id).cloned())
    }

    async fn email_of_user(&mut self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.working.users.get(&user_id).cloned())
    }
}

#[async_trait]
impl OrderTx for MemoryTx {
    async fn ensure_open_order(&mut self, user_id: Uuid) -> Result<(Order, bool)> {
        if let Some(order) = self.working.orders.values().find(|o| o.user_id == user_id && o.is_open()) {
            return Ok((order.clone(), false));
        }
        let order = Order::open(user_id);
        self.working.orders.insert(order.id, order.clone());
        Ok((order, true))
    }

    async fn order(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn order_for_update(&mut self, order_id: Uuid) -> Result<Option<Order>> {
        self.order(order_id).await
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        *self.order_mut(order.id)? = order.clone();
        Ok(())
    }

    async fn delete_order(&mut self, order_id: Uuid) -> Result<()> {
        self.working.orders.remove(&order_id);
        self.working.items.retain(|i| i.order_id != order_id);
        self.working.receipts.retain(|r| r.order_id != order_id);
        Ok(())
    }

    async fn orders(&mut self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.working.orders.values().filter(|o| filter.matches(o)).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn items(&mut self, order_id: Uuid) -> Result<Vec<LineItem>> {
        Ok(self.working.items.iter().filter(|i| i.order_id == order_id).cloned().collect())
    }

    async fn insert_item(&mut self, item: &LineItem) -> Result<()> {
        let duplicate = item.kind == ItemKind::Digital
            && self.working.items.iter().any(|i| {
                i.order_id == item.order_id && i.book_id == item.book_id && i.kind == ItemKind::Digital
            });
        if duplicate {
            return Err(OrderError::Conflict("Digital copy already in the order".into()));
        }
        self.working.items.push(item.clone());
        Ok(())
    }

    async fn update_item_quantity(&mut self, item_id: Uuid, quantity: u32) -> Result<()> {
        self.item_mut(item_id)?.quantity = quantity;
        Ok(())
    }

    async fn delete_item(&mut self, item_id: Uuid) -> Result<()> {
        self.working.items.retain(|i| i.id != item_id);
        Ok(())
    }

    async fn owned_digital_books(&mut self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let paid: HashSet<Uuid> = self.working.orders.values()
            .filter(|o| o.user_id == user_id && o.status >= OrderStatus::Paid)
            .map(|o| o.id)
            .collect();
        let mut books: Vec<Uuid> = self.working.items.iter()
            .filter(|i| i.kind == ItemKind::Digital && paid.contains(&i.order_id))
            .map(|i| i.book_id)
            .collect();
        books.sort();
        books.dedup();
        Ok(books)
    }

    async fn take_stock(&mut self, book_id: Uuid, quantity: u32) -> Result<()> {
        let book = self.book_mut(book_id)?;
        if book.stock < quantity { return Err(OrderError::InsufficientStock); }
        book.stock -= quantity;
        Ok(())
    }

    async fn return_stock(&mut self, book_id: Uuid, quantity: u32) -> Result<()> {
        let book = self.book_mut(book_id)?;
        book.stock += quantity;
        Ok(())
    }

    async fn insert_promo(&mut self, promo: &Promo) -> Result<()> {
        if self.working.promos.values().any(|p| p.code == promo.code) {
            return Err(OrderError::Conflict(format!("Promo code {} already exists", promo.code)));
        }
        self.working.promos.insert(promo.id, promo.clone());
        Ok(())
    }

    async fn grant_promo(&mut self, promo_id: Uuid, user_id: Uuid) -> Result<()> {
        self.working.grants.insert((promo_id, user_id));
        Ok(())
    }

    async fn promo(&mut self, promo_id: Uuid) -> Result<Option<Promo>> {
        Ok(self.working.promos.get(&promo_id).cloned())
    }

    async fn granted_promo(&mut self, code: &str, user_id: Uuid) -> Result<Option<Promo>> {
        let grants = &self.working.grants;
        Ok(self.working.promos.values()
            .find(|p| p.code == code && grants.contains(&(p.id, user_id)))
            .cloned())
    }

    async fn promos(&mut self, user_id: Option<Uuid>) -> Result<Vec<Promo>> {
        let grants = &self.working.grants;
        let mut promos: Vec<Promo> = self.working.promos.values()
            .filter(|p| user_id.map_or(true, |u| grants.contains(&(p.id, u))))
            .cloned()
            .collect();
        promos.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(promos)
    }

    async fn promo_in_use(&mut self, promo_id: Uuid) -> Result<bool> {
        Ok(self.working.orders.values().any(|o| o.promo_id == Some(promo_id)))
    }

    async fn delete_promo(&mut self, promo_id: Uuid) -> Result<()> {
        self.working.promos.remove(&promo_id);
        self.working.grants.retain(|(p, _)| *p != promo_id);
        Ok(())
    }

    async fn claim_promo(&mut self, promo_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let promo = self.promo_mut(promo_id)?;
        promo.ensure_redeemable(now)?;
        promo.limit -= 1;
        Ok(())
    }

    async fn release_promo(&mut self, promo_id: Uuid) -> Result<()> {
        if let Some(promo) = self.working.promos.get_mut(&promo_id) {
            promo.limit += 1;
        }
        Ok(())
    }

    async fn receipt_by_authority(&mut self, authority: &str) -> Result<Option<GatewayReceipt>> {
        Ok(self.working.receipts.iter().find(|r| r.authority == authority).cloned())
    }

    async fn receipt_of_order(&mut self, order_id: Uuid) -> Result<Option<GatewayReceipt>> {
        Ok(self.working.receipts.iter().find(|r| r.order_id == order_id).cloned())
    }

    async fn replace_receipt(&mut self, receipt: &GatewayReceipt) -> Result<()> {
        if self.working.receipts.iter().any(|r| r.authority == receipt.authority) {
            return Err(OrderError::Conflict("Authority already recorded".into()));
        }
        self.working.receipts.retain(|r| r.order_id != receipt.order_id || r.is_verified());
        if self.working.receipts.iter().any(|r| r.order_id == receipt.order_id) {
            return Err(OrderError::Conflict("Order already has a verified payment".into()));
        }
        self.working.receipts.push(receipt.clone());
        Ok(())
    }

    async fn save_receipt(&mut self, receipt: &GatewayReceipt) -> Result<()> {
        let slot = self.working.receipts.iter_mut().find(|r| r.id == receipt.id).ok_or(OrderError::NotFound("receipt"))?;
        *slot = receipt.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

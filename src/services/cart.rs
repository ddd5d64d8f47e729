//! Cart Manager: the single open order per user and its line items

use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{item_of, open_order_of, reprice};
use crate::domain::aggregates::cart::{physical_quantity, plan_lines, Cart};
use crate::domain::aggregates::{LineItem, Order};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Availability, ItemKind, RequestedKind};
use crate::publisher::EventPublisher;
use crate::store::{OrderStore, OrderTx};
use crate::{OrderError, Result};

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct AddItem {
    pub book_id: Uuid,
    pub kind: RequestedKind,
    pub quantity: u32,
}

#[derive(Clone)]
pub struct CartManager {
    store: Arc<dyn OrderStore>,
    events: EventPublisher,
}

impl CartManager {
    pub fn new(store: Arc<dyn OrderStore>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    /// Adds a book to the user's open order, opening one if needed.
    /// Physical copies are reserved from stock immediately.
    pub async fn add_item(&self, user_id: Uuid, req: AddItem) -> Result<Cart> {
        let mut tx = self.store.begin().await?;
        if !tx.user_exists(user_id).await? {
            return Err(OrderError::NotFound("user"));
        }
        let book = tx.book(req.book_id).await?.ok_or(OrderError::NotFound("book"))?;
        if book.availability == Availability::None {
            return Err(OrderError::NotFound("book"));
        }
        if !book.availability.admits(req.kind) {
            return Err(OrderError::Forbidden(format!("Book is not sold as {}", req.kind.name())));
        }
        let reserve = physical_quantity(req.kind, req.quantity);
        if req.kind != RequestedKind::Digital && req.quantity == 0 {
            return Err(OrderError::InvalidInput("Quantity must be at least 1".into()));
        }
        if reserve > book.stock {
            return Err(OrderError::InsufficientStock);
        }

        let (mut order, opened) = tx.ensure_open_order(user_id).await?;
        let existing = tx.items(order.id).await?;
        for (kind, quantity) in plan_lines(req.kind, req.quantity) {
            let same = existing.iter().find(|i| i.book_id == req.book_id && i.kind == kind);
            match (kind, same) {
                (ItemKind::Digital, Some(_)) => {
                    return Err(OrderError::Conflict("Digital copy already in the order".into()));
                }
                (ItemKind::Physical, Some(line)) => {
                    tx.update_item_quantity(line.id, line.quantity + quantity).await?;
                }
                (_, None) => tx.insert_item(&LineItem::new(order.id, req.book_id, kind, quantity)).await?,
            }
        }
        if reserve > 0 {
            tx.take_stock(req.book_id, reserve).await?;
        }
        let cart = finish(tx, &mut order).await?;

        tracing::info!(order_id = %order.id, book_id = %req.book_id, kind = req.kind.name(), quantity = req.quantity, total = order.total, "Item added to cart");
        let mut events = Vec::with_capacity(2);
        if opened {
            events.push(OrderEvent::Opened { order_id: order.id, user_id });
        }
        events.push(OrderEvent::ItemAdded { order_id: order.id, book_id: req.book_id, kind: req.kind, quantity: req.quantity });
        self.events.publish(events).await;
        Ok(cart)
    }

    pub async fn increase_quantity(&self, user_id: Uuid, order_id: Uuid, item_id: Uuid) -> Result<Cart> {
        let mut tx = self.store.begin().await?;
        let mut order = open_order_of(tx.as_mut(), user_id, order_id).await?;
        let item = item_of(tx.as_mut(), &order, item_id).await?;
        item.ensure_physical()?;
        tx.take_stock(item.book_id, 1).await?;
        tx.update_item_quantity(item.id, item.quantity + 1).await?;
        finish(tx, &mut order).await
    }

    pub async fn decrease_quantity(&self, user_id: Uuid, order_id: Uuid, item_id: Uuid) -> Result<Cart> {
        let mut tx = self.store.begin().await?;
        let mut order = open_order_of(tx.as_mut(), user_id, order_id).await?;
        let item = item_of(tx.as_mut(), &order, item_id).await?;
        item.ensure_physical()?;
        if item.quantity <= 1 {
            return Err(OrderError::InvalidInput("Quantity cannot drop below 1, remove the item instead".into()));
        }
        tx.update_item_quantity(item.id, item.quantity - 1).await?;
        tx.return_stock(item.book_id, 1).await?;
        finish(tx, &mut order).await
    }

    pub async fn remove_item(&self, user_id: Uuid, order_id: Uuid, item_id: Uuid) -> Result<Cart> {
        let mut tx = self.store.begin().await?;
        let mut order = open_order_of(tx.as_mut(), user_id, order_id).await?;
        let item = item_of(tx.as_mut(), &order, item_id).await?;
        tx.delete_item(item.id).await?;
        if item.is_physical() {
            tx.return_stock(item.book_id, item.quantity).await?;
        }
        let cart = finish(tx, &mut order).await?;
        tracing::info!(order_id = %order_id, item_id = %item_id, total = order.total, "Item removed from cart");
        self.events.publish(vec![OrderEvent::ItemRemoved { order_id, item_id }]).await;
        Ok(cart)
    }

    pub async fn list_items(&self, user_id: Uuid, order_id: Uuid) -> Result<Vec<LineItem>> {
        let mut tx = self.store.begin().await?;
        let order = tx.order(order_id).await?.ok_or(OrderError::NotFound("order"))?;
        order.ensure_owner(user_id)?;
        tx.items(order_id).await
    }

    pub async fn set_phone(&self, user_id: Uuid, order_id: Uuid, phone_id: Uuid) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = open_order_of(tx.as_mut(), user_id, order_id).await?;
        let phone = tx.phone_of_user(phone_id).await?.ok_or(OrderError::NotFound("phone"))?;
        if phone.user_id != order.user_id {
            return Err(OrderError::Forbidden("Phone belongs to another user".into()));
        }
        order.phone_id = Some(phone_id);
        tx.save_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }

    pub async fn set_address(&self, user_id: Uuid, order_id: Uuid, address_id: Uuid) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = open_order_of(tx.as_mut(), user_id, order_id).await?;
        let address = tx.address_of_user(address_id).await?.ok_or(OrderError::NotFound("address"))?;
        if address.user_id != order.user_id {
            return Err(OrderError::Forbidden("Address belongs to another user".into()));
        }
        order.address_id = Some(address_id);
        tx.save_order(&order).await?;
        tx.commit().await?;
        Ok(order)
    }
}

async fn finish(mut tx: Box<dyn OrderTx>, order: &mut Order) -> Result<Cart> {
    reprice(tx.as_mut(), order).await?;
    let items = tx.items(order.id).await?;
    tx.commit().await?;
    Ok(Cart { order: order.clone(), items })
}

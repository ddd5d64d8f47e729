//! Read-side order listings for customers and administrators

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::cart::Cart;
use crate::domain::aggregates::Order;
use crate::domain::value_objects::OrderStatus;
use crate::store::{OrderFilter, OrderStore};
use crate::{OrderError, Result};

/// A purchased digital copy in the customer's library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DigitalCopy {
    pub book_id: Uuid,
    pub title: String,
    pub file: Option<String>,
}

#[derive(Clone)]
pub struct OrderQueries {
    store: Arc<dyn OrderStore>,
}

impl OrderQueries {
    pub fn new(store: Arc<dyn OrderStore>) -> Self { Self { store } }

    pub async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>> {
        let mut tx = self.store.begin().await?;
        tx.orders(&filter).await
    }

    pub async fn for_user(&self, user_id: Uuid, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        self.list(OrderFilter { user_id: Some(user_id), status, ..Default::default() }).await
    }

    pub async fn by_date(&self, from: DateTime<Utc>, to: DateTime<Utc>, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        if from > to {
            return Err(OrderError::InvalidInput("Date range start is after its end".into()));
        }
        self.list(OrderFilter { status, created_between: Some((from, to)), ..Default::default() }).await
    }

    /// An order with its lines. Customers only see their own orders.
    pub async fn get(&self, order_id: Uuid, user_id: Option<Uuid>) -> Result<Cart> {
        let mut tx = self.store.begin().await?;
        let order = tx.order(order_id).await?.ok_or(OrderError::NotFound("order"))?;
        if let Some(user_id) = user_id {
            order.ensure_owner(user_id)?;
        }
        let items = tx.items(order_id).await?;
        Ok(Cart { order, items })
    }

    pub async fn digital_library(&self, user_id: Uuid) -> Result<Vec<DigitalCopy>> {
        let mut tx = self.store.begin().await?;
        let mut library = Vec::new();
        for book_id in tx.owned_digital_books(user_id).await? {
            if let Some(book) = tx.book(book_id).await? {
                library.push(DigitalCopy { book_id, title: book.title, file: book.file });
            }
        }
        Ok(library)
    }

    /// Authorizes a download of a purchased digital copy.
    pub async fn authorize_download(&self, user_id: Uuid, book_id: Uuid) -> Result<DigitalCopy> {
        let mut tx = self.store.begin().await?;
        if !tx.owned_digital_books(user_id).await?.contains(&book_id) {
            return Err(OrderError::NotFound("purchased book"));
        }
        let book = tx.book(book_id).await?.ok_or(OrderError::NotFound("book"))?;
        if book.file.is_none() {
            return Err(OrderError::NotFound("digital file"));
        }
        Ok(DigitalCopy { book_id, title: book.title, file: book.file })
    }
}

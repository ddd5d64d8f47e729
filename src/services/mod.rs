//! Order core services
//!
//! Each public operation opens one store transaction, mutates, recomputes the
//! order total where the mutation can change it, commits, and then publishes
//! the resulting events.

pub mod cart;
pub mod lifecycle;
pub mod payment;
pub mod promo;
pub mod queries;

use uuid::Uuid;

use crate::domain::aggregates::{LineItem, Order};
use crate::domain::pricing::{self, PricedLine};
use crate::store::OrderTx;
use crate::{OrderError, Result};

pub use cart::{AddItem, CartManager};
pub use lifecycle::OrderLifecycle;
pub use payment::{PaymentCoordinator, PaymentOutcome, PaymentRedirect};
pub use promo::PromoEngine;
pub use queries::{DigitalCopy, OrderQueries};

/// Recomputes `order.total` from its current lines and promo and persists the order.
pub(crate) async fn reprice(tx: &mut dyn OrderTx, order: &mut Order) -> Result<()> {
    let items = tx.items(order.id).await?;
    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        let book = tx.book(item.book_id).await?.ok_or(OrderError::NotFound("book"))?;
        lines.push(PricedLine { kind: item.kind, quantity: item.quantity, price: book.price });
    }
    let discount = match order.promo_id {
        Some(promo_id) => Some(tx.promo(promo_id).await?.ok_or(OrderError::NotFound("promo"))?.discount()),
        None => None,
    };
    order.total = pricing::order_total(&lines, discount.as_ref());
    tx.save_order(order).await
}

/// Loads and locks an order the caller owns, failing unless it is still open.
pub(crate) async fn open_order_of(tx: &mut dyn OrderTx, user_id: Uuid, order_id: Uuid) -> Result<Order> {
    let order = tx.order_for_update(order_id).await?.ok_or(OrderError::NotFound("order"))?;
    order.ensure_owner(user_id)?;
    order.ensure_open()?;
    Ok(order)
}

pub(crate) async fn item_of(tx: &mut dyn OrderTx, order: &Order, item_id: Uuid) -> Result<LineItem> {
    tx.items(order.id).await?
        .into_iter()
        .find(|i| i.id == item_id)
        .ok_or(OrderError::NotFound("item"))
}

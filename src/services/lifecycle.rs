//! Order State Machine: administrative transitions

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::cart::has_physical;
use crate::domain::aggregates::Order;
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::OrderStatus;
use crate::publisher::EventPublisher;
use crate::store::{OrderStore, OrderTx};
use crate::{OrderError, Result};

#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    events: EventPublisher,
}

impl OrderLifecycle {
    pub fn new(store: Arc<dyn OrderStore>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    /// PAID -> VERIFIED or VERIFIED -> SHIPPED. Marking an order PAID is reserved to the payment flow.
    pub async fn set_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = locked(tx.as_mut(), order_id).await?;
        let physical = has_physical(&tx.items(order_id).await?);
        if status == OrderStatus::Paid {
            return Err(OrderError::InvalidStateTransition("Orders are marked paid by payment verification only".into()));
        }
        order.advance(status, physical)?;
        tx.save_order(&order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, status = %status, "Order status changed");
        self.events.publish(vec![OrderEvent::StatusChanged { order_id, status }]).await;
        Ok(order)
    }

    pub async fn set_stn(&self, order_id: Uuid, stn: &str) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = locked(tx.as_mut(), order_id).await?;
        order.set_stn(stn)?;
        tx.save_order(&order).await?;
        tx.commit().await?;

        let stn = order.stn.clone().unwrap_or_default();
        tracing::info!(order_id = %order_id, stn = %stn, "Tracking number assigned");
        self.events.publish(vec![OrderEvent::TrackingAssigned { order_id, stn }]).await;
        Ok(order)
    }

    /// Deletes an order that has not shipped. Reserved stock is not returned;
    /// an applied promo gets its redemption back.
    pub async fn delete_order(&self, order_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let order = locked(tx.as_mut(), order_id).await?;
        order.ensure_deletable()?;
        tx.delete_order(order_id).await?;
        if let Some(promo_id) = order.promo_id {
            tx.release_promo(promo_id).await?;
        }
        tx.commit().await?;

        tracing::info!(order_id = %order_id, status = %order.status, "Order deleted");
        self.events.publish(vec![OrderEvent::Deleted { order_id }]).await;
        Ok(())
    }
}

async fn locked(tx: &mut dyn OrderTx, order_id: Uuid) -> Result<Order> {
    tx.order_for_update(order_id).await?.ok_or(OrderError::NotFound("order"))
}

//! Promo Engine: issuance, grants and redemption accounting

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::{open_order_of, reprice};
use crate::domain::aggregates::{NewPromo, Order, Promo};
use crate::domain::events::OrderEvent;
use crate::publisher::EventPublisher;
use crate::store::OrderStore;
use crate::{OrderError, Result};

#[derive(Clone)]
pub struct PromoEngine {
    store: Arc<dyn OrderStore>,
    events: EventPublisher,
}

impl PromoEngine {
    pub fn new(store: Arc<dyn OrderStore>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    /// Creates a promo and grants it to its owner.
    pub async fn create_promo(&self, owner_id: Uuid, promo: NewPromo) -> Result<Promo> {
        let promo = promo.into_promo();
        let mut tx = self.store.begin().await?;
        tx.insert_promo(&promo).await?;
        tx.grant_promo(promo.id, owner_id).await?;
        tx.commit().await?;
        tracing::info!(promo_id = %promo.id, code = %promo.code, limit = promo.limit, "Promo created");
        Ok(promo)
    }

    pub async fn grant_promo(&self, promo_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        tx.promo(promo_id).await?.ok_or(OrderError::NotFound("promo"))?;
        if !tx.user_exists(user_id).await? {
            return Err(OrderError::NotFound("user"));
        }
        tx.grant_promo(promo_id, user_id).await?;
        tx.commit().await
    }

    /// Deletes a promo and its grants. Promos still referenced by an order are kept.
    pub async fn delete_promo(&self, promo_id: Uuid) -> Result<()> {
        let mut tx = self.store.begin().await?;
        tx.promo(promo_id).await?.ok_or(OrderError::NotFound("promo"))?;
        if tx.promo_in_use(promo_id).await? {
            return Err(OrderError::Conflict("Promo is applied to an order".into()));
        }
        tx.delete_promo(promo_id).await?;
        tx.commit().await?;
        tracing::info!(promo_id = %promo_id, "Promo deleted");
        Ok(())
    }

    /// Applies a granted promo to the user's open order, replacing any promo already applied.
    pub async fn apply_to_order(&self, user_id: Uuid, order_id: Uuid, code: &str) -> Result<Order> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut order = open_order_of(tx.as_mut(), user_id, order_id).await?;
        let promo = tx.granted_promo(code.trim(), user_id).await?
            .ok_or_else(|| OrderError::PromoUnusable("Promo code is not available to this user".into()))?;
        promo.ensure_redeemable(now)?;

        if let Some(previous) = order.promo_id {
            tx.release_promo(previous).await?;
        }
        tx.claim_promo(promo.id, now).await?;
        order.promo_id = Some(promo.id);
        reprice(tx.as_mut(), &mut order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, promo_id = %promo.id, total = order.total, "Promo applied");
        self.events.publish(vec![OrderEvent::PromoApplied { order_id, promo_id: promo.id, total: order.total }]).await;
        Ok(order)
    }

    pub async fn remove_from_order(&self, user_id: Uuid, order_id: Uuid) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = open_order_of(tx.as_mut(), user_id, order_id).await?;
        let promo_id = order.promo_id.take().ok_or(OrderError::NotFound("promo"))?;
        tx.release_promo(promo_id).await?;
        reprice(tx.as_mut(), &mut order).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, promo_id = %promo_id, total = order.total, "Promo removed");
        self.events.publish(vec![OrderEvent::PromoRemoved { order_id, promo_id, total: order.total }]).await;
        Ok(order)
    }

    /// Promos granted to `user_id`.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Promo>> {
        let mut tx = self.store.begin().await?;
        tx.promos(Some(user_id)).await
    }

    pub async fn list_all(&self) -> Result<Vec<Promo>> {
        let mut tx = self.store.begin().await?;
        tx.promos(None).await
    }

    /// The promo applied to an order, if any.
    pub async fn promo_of_order(&self, order_id: Uuid) -> Result<Option<Promo>> {
        let mut tx = self.store.begin().await?;
        let order = tx.order(order_id).await?.ok_or(OrderError::NotFound("order"))?;
        match order.promo_id {
            Some(promo_id) => tx.promo(promo_id).await,
            None => Ok(None),
        }
    }
}

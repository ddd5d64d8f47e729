//! Payment Coordinator
//!
//! Two-phase protocol with the gateway. Gateway calls never run inside a store
//! transaction: phase one reads the amount, requests an authority, then
//! persists the receipt in its own short transaction; phase two reads the
//! amount of record, verifies, then commits the outcome in one transaction.
//! A verified payment only marks the order PAID when the order still totals
//! the verified amount; otherwise the receipt is kept and the order held.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::cart::has_physical;
use crate::domain::aggregates::receipt::{CODE_ALREADY_VERIFIED, CODE_CANCELLED, CODE_VERIFIED};
use crate::domain::aggregates::GatewayReceipt;
use crate::domain::events::OrderEvent;
use crate::gateway::{PaymentGateway, PaymentRequest};
use crate::publisher::EventPublisher;
use crate::store::{OrderStore, OrderTx};
use crate::{OrderError, Result};

#[derive(Clone, Debug, Serialize)]
pub struct PaymentRedirect {
    pub order_id: Uuid,
    pub authority: String,
    pub amount: u64,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentOutcome {
    pub order_id: Uuid,
    pub ref_id: String,
    pub amount: u64,
}

#[derive(Clone)]
pub struct PaymentCoordinator {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventPublisher,
    callback_url: String,
}

impl PaymentCoordinator {
    pub fn new(store: Arc<dyn OrderStore>, gateway: Arc<dyn PaymentGateway>, events: EventPublisher, callback_url: impl Into<String>) -> Self {
        Self { store, gateway, events, callback_url: callback_url.into() }
    }

    /// Phase one: opens a gateway session for the user's open order.
    pub async fn initiate(&self, user_id: Uuid, order_id: Uuid) -> Result<PaymentRedirect> {
        let request = {
            let mut tx = self.store.begin().await?;
            let order = tx.order(order_id).await?.ok_or(OrderError::NotFound("order"))?;
            order.ensure_owner(user_id)?;
            order.ensure_open()?;
            let items = tx.items(order_id).await?;
            if items.is_empty() {
                return Err(OrderError::InvalidInput("Order has no items".into()));
            }
            order.ensure_contact(has_physical(&items))?;
            if order.total == 0 {
                return Err(OrderError::InvalidInput("Order total is zero, nothing to pay".into()));
            }
            let email = tx.email_of_user(order.user_id).await?;
            let mobile = match order.phone_id {
                Some(phone_id) => tx.phone_of_user(phone_id).await?.map(|p| p.number),
                None => None,
            };
            PaymentRequest {
                amount: order.total,
                callback_url: self.callback_url.clone(),
                description: format!("Bookstore order {}", order.id),
                email,
                mobile,
            }
        };

        let authority = self.gateway.request(&request).await?;

        let mut tx = self.store.begin().await?;
        let order = tx.order_for_update(order_id).await?.ok_or(OrderError::NotFound("order"))?;
        order.ensure_open()?;
        tx.replace_receipt(&GatewayReceipt::pending(order_id, authority.clone())).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, authority = %authority, amount = request.amount, "Payment initiated");
        self.events.publish(vec![OrderEvent::PaymentInitiated { order_id, authority: authority.clone(), amount: request.amount }]).await;
        Ok(PaymentRedirect { order_id, url: self.gateway.pay_url(&authority), authority, amount: request.amount })
    }

    /// Phase two: handles the gateway callback. Safe to repeat; a repeat after
    /// success fails with `Conflict` and changes nothing.
    pub async fn callback(&self, authority: Option<&str>, status: Option<&str>) -> Result<PaymentOutcome> {
        let authority = authority.map(str::trim).filter(|a| !a.is_empty())
            .ok_or_else(|| OrderError::InvalidInput("Missing Authority".into()))?;
        let paid = match status {
            Some("OK") => true,
            Some("NOK") => false,
            _ => return Err(OrderError::InvalidInput("Status must be OK or NOK".into())),
        };

        let (order_id, amount) = {
            let mut tx = self.store.begin().await?;
            let receipt = tx.receipt_by_authority(authority).await?.ok_or(OrderError::NotFound("payment"))?;
            if receipt.is_verified() {
                return Err(OrderError::Conflict("Payment already verified".into()));
            }
            let order = tx.order(receipt.order_id).await?.ok_or(OrderError::NotFound("order"))?;
            if !paid {
                self.fail(tx, receipt, CODE_CANCELLED).await?;
                return Err(OrderError::Upstream("Payment was cancelled at the gateway".into()));
            }
            (order.id, order.total)
        };

        let verification = self.gateway.verify(authority, amount).await?;

        let mut tx = self.store.begin().await?;
        let mut receipt = tx.receipt_by_authority(authority).await?.ok_or(OrderError::NotFound("payment"))?;
        match verification.code {
            CODE_VERIFIED => {
                let ref_id = verification.ref_id
                    .ok_or_else(|| OrderError::Upstream("Gateway verified without a reference id".into()))?;
                receipt.record_success(ref_id.clone())?;
                tx.save_receipt(&receipt).await?;
                let mut order = tx.order_for_update(order_id).await?.ok_or(OrderError::NotFound("order"))?;
                // the captured payment is recorded even when the order cannot move to PAID
                let held = if !order.is_open() {
                    tracing::warn!(order_id = %order_id, status = %order.status, "Verified payment for an order no longer open");
                    None
                } else if order.total != amount {
                    Some(OrderError::Conflict(format!(
                        "Order total changed to {} while a payment of {amount} was verified", order.total
                    )))
                } else {
                    let physical = has_physical(&tx.items(order_id).await?);
                    match order.mark_paid(physical, Utc::now()) {
                        Ok(()) => {
                            tx.save_order(&order).await?;
                            None
                        }
                        Err(e) => Some(e),
                    }
                };
                tx.commit().await?;

                if let Some(e) = held {
                    tracing::error!(
                        order_id = %order_id, authority = %authority, ref_id = %ref_id, amount, total = order.total, error = %e,
                        "Payment captured but order left unpaid, needs reconciliation"
                    );
                    return Err(e);
                }
                tracing::info!(order_id = %order_id, authority = %authority, ref_id = %ref_id, amount, "Payment verified");
                self.events.publish(vec![OrderEvent::Paid { order_id, ref_id: ref_id.clone(), total: amount }]).await;
                Ok(PaymentOutcome { order_id, ref_id, amount })
            }
            CODE_ALREADY_VERIFIED => Err(OrderError::Conflict("Payment already verified".into())),
            code => {
                self.fail(tx, receipt, code).await?;
                Err(OrderError::Upstream(format!("Payment verification failed with code {code}")))
            }
        }
    }

    async fn fail(&self, mut tx: Box<dyn OrderTx>, mut receipt: GatewayReceipt, code: i32) -> Result<()> {
        receipt.record_failure(code)?;
        tx.save_receipt(&receipt).await?;
        tx.commit().await?;
        tracing::warn!(order_id = %receipt.order_id, authority = %receipt.authority, code, "Payment not completed");
        self.events.publish(vec![OrderEvent::PaymentFailed { order_id: receipt.order_id, authority: receipt.authority, code }]).await;
        Ok(())
    }
}

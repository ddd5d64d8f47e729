//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::OrderStatus;
use crate::{OrderError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub total: u64,
    pub stn: Option<String>,
    pub promo_id: Option<Uuid>,
    pub phone_id: Option<Uuid>,
    pub address_id: Option<Uuid>,
}

impl Order {
    /// A fresh open order (cart) for `user_id`.
    pub fn open(user_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(), user_id, created_at: Utc::now(), received_at: None,
            status: OrderStatus::Created, total: 0, stn: None, promo_id: None, phone_id: None, address_id: None,
        }
    }

    pub fn is_open(&self) -> bool { self.status == OrderStatus::Created }

    pub fn ensure_owner(&self, user_id: Uuid) -> Result<()> {
        if self.user_id != user_id {
            return Err(OrderError::Forbidden("Order belongs to another user".into()));
        }
        Ok(())
    }

    pub fn ensure_open(&self) -> Result<()> {
        if !self.is_open() { return Err(OrderError::not_open()); }
        Ok(())
    }

    /// Physical orders must carry a phone and an address before leaving CREATED.
    pub fn ensure_contact(&self, has_physical: bool) -> Result<()> {
        if has_physical && (self.phone_id.is_none() || self.address_id.is_none()) {
            return Err(OrderError::InvalidStateTransition("Physical orders need a phone and an address".into()));
        }
        Ok(())
    }

    /// CREATED -> PAID, driven only by a verified gateway receipt.
    pub fn mark_paid(&mut self, has_physical: bool, at: DateTime<Utc>) -> Result<()> {
        if self.status != OrderStatus::Created {
            return Err(self.rejected(OrderStatus::Paid));
        }
        self.ensure_contact(has_physical)?;
        self.status = OrderStatus::Paid;
        self.received_at = Some(at);
        Ok(())
    }

    /// Administrative transitions: PAID -> VERIFIED and VERIFIED -> SHIPPED.
    pub fn advance(&mut self, to: OrderStatus, has_physical: bool) -> Result<()> {
        match (self.status, to) {
            (OrderStatus::Paid, OrderStatus::Verified) => {}
            (OrderStatus::Verified, OrderStatus::Shipped) => {
                if self.stn.is_none() {
                    return Err(OrderError::InvalidStateTransition("Shipping requires a tracking number".into()));
                }
            }
            (_, to) => return Err(self.rejected(to)),
        }
        self.ensure_contact(has_physical)?;
        self.status = to;
        Ok(())
    }

    pub fn set_stn(&mut self, stn: &str) -> Result<()> {
        let stn = stn.trim();
        if stn.is_empty() { return Err(OrderError::InvalidInput("Tracking number is empty".into())); }
        if !matches!(self.status, OrderStatus::Verified | OrderStatus::Shipped) {
            return Err(OrderError::InvalidStateTransition("Tracking number requires a verified order".into()));
        }
        self.stn = Some(stn.to_string());
        Ok(())
    }

    pub fn ensure_deletable(&self) -> Result<()> {
        if self.status == OrderStatus::Shipped {
            return Err(OrderError::InvalidStateTransition("Shipped orders cannot be deleted".into()));
        }
        Ok(())
    }

    fn rejected(&self, to: OrderStatus) -> OrderError {
        OrderError::InvalidStateTransition(format!("Cannot move order from {} to {}", self.status, to))
    }
}

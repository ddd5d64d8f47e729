//! Domain events
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{OrderStatus, RequestedKind};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Opened { order_id: Uuid, user_id: Uuid },
    ItemAdded { order_id: Uuid, book_id: Uuid, kind: RequestedKind, quantity: u32 },
    ItemRemoved { order_id: Uuid, item_id: Uuid },
    PromoApplied { order_id: Uuid, promo_id: Uuid, total: u64 },
    PromoRemoved { order_id: Uuid, promo_id: Uuid, total: u64 },
    PaymentInitiated { order_id: Uuid, authority: String, amount: u64 },
    Paid { order_id: Uuid, ref_id: String, total: u64 },
    PaymentFailed { order_id: Uuid, authority: String, code: i32 },
    StatusChanged { order_id: Uuid, status: OrderStatus },
    TrackingAssigned { order_id: Uuid, stn: String },
    Deleted { order_id: Uuid },
}

impl OrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "opened",
            Self::ItemAdded { .. } => "item_added",
            Self::ItemRemoved { .. } => "item_removed",
            Self::PromoApplied { .. } => "promo_applied",
            Self::PromoRemoved { .. } => "promo_removed",
            Self::PaymentInitiated { .. } => "payment_initiated",
            Self::Paid { .. } => "paid",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::StatusChanged { .. } => "status_changed",
            Self::TrackingAssigned { .. } => "tracking_assigned",
            Self::Deleted { .. } => "deleted",
        }
    }

    pub fn subject(&self) -> String { format!("bookstore.orders.{}", self.name()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_is_tagged() {
        let id = Uuid::nil();
        let event = OrderEvent::StatusChanged { order_id: id, status: OrderStatus::Verified };
        assert_eq!(event.subject(), "bookstore.orders.status_changed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status_changed");
        assert_eq!(json["status"], 2);
    }
}

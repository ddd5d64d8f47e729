//! Cart: line items of an open order

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::{ItemKind, RequestedKind};
use crate::{OrderError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub book_id: Uuid,
    pub kind: ItemKind,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(order_id: Uuid, book_id: Uuid, kind: ItemKind, quantity: u32) -> Self {
        Self { id: Uuid::now_v7(), order_id, book_id, kind, quantity }
    }

    pub fn is_physical(&self) -> bool { self.kind == ItemKind::Physical }

    pub fn ensure_physical(&self) -> Result<()> {
        if !self.is_physical() {
            return Err(OrderError::InvalidInput("Only physical items have a quantity".into()));
        }
        Ok(())
    }
}

/// Expands a requested kind into the stored lines it produces.
/// Digital lines always carry quantity 1; a bundle is a digital line plus a physical line.
pub fn plan_lines(kind: RequestedKind, quantity: u32) -> Vec<(ItemKind, u32)> {
    match kind {
        RequestedKind::Digital => vec![(ItemKind::Digital, 1)],
        RequestedKind::Physical => vec![(ItemKind::Physical, quantity)],
        RequestedKind::Bundle => vec![(ItemKind::Digital, 1), (ItemKind::Physical, quantity)],
    }
}

/// Number of physical copies a request reserves.
pub fn physical_quantity(kind: RequestedKind, quantity: u32) -> u32 {
    match kind {
        RequestedKind::Digital => 0,
        RequestedKind::Physical | RequestedKind::Bundle => quantity,
    }
}

pub fn has_physical(items: &[LineItem]) -> bool {
    items.iter().any(LineItem::is_physical)
}

/// An order together with its lines.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    pub order: Order,
    pub items: Vec<LineItem>,
}

impl Cart {
    pub fn has_physical(&self) -> bool { has_physical(&self.items) }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

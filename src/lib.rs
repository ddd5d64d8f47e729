//! Bookstore Order Core
//!
//! Order lifecycle service for an online bookstore.
//!
//! ## Features
//! - Shopping cart with digital, physical and bundle line items
//! - Integer pricing engine with per-item discounts and promo codes
//! - Promo issuance, grants and redemption accounting
//! - Order state machine (created, paid, verified, shipped)
//! - Zarinpal payment reconciliation with idempotent callbacks
//! - Physical stock reservation on add, release on remove

pub mod config;
pub mod domain;
pub mod gateway;
pub mod http;
pub mod publisher;
pub mod services;
pub mod store;

use thiserror::Error;

pub use domain::value_objects::{Availability, ItemKind, OrderStatus, RequestedKind};
pub use domain::aggregates::{GatewayReceipt, LineItem, NewPromo, Order, Promo};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvalidStateTransition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient stock")]
    InsufficientStock,

    #[error("{0}")]
    PromoUnusable(String),

    #[error("Payment gateway error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrderError {
    /// Machine-readable kind carried in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            Self::Conflict(_) => "CONFLICT",
            Self::InsufficientStock => "INSUFFICIENT_STOCK",
            Self::PromoUnusable(_) => "PROMO_UNUSABLE",
            Self::Upstream(_) | Self::Storage(_) => "UPSTREAM_FAILURE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub(crate) fn not_open() -> Self {
        Self::InvalidStateTransition("Order is not open".into())
    }
}

pub type Result<T> = std::result::Result<T, OrderError>;

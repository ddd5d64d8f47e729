//! Gateway receipt: local record of one payment attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OrderError, Result};

pub const CODE_PENDING: i32 = 0;
pub const CODE_VERIFIED: i32 = 100;
pub const CODE_ALREADY_VERIFIED: i32 = 101;
/// Recorded when the payer cancels at the gateway (`Status=NOK`).
pub const CODE_CANCELLED: i32 = -1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReceipt {
    pub id: Uuid,
    pub order_id: Uuid,
    pub authority: String,
    pub ref_id: Option<String>,
    pub code: i32,
    pub created_at: DateTime<Utc>,
}

impl GatewayReceipt {
    pub fn pending(order_id: Uuid, authority: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(), order_id, authority: authority.into(), ref_id: None,
            code: CODE_PENDING, created_at: Utc::now(),
        }
    }

    pub fn is_verified(&self) -> bool { self.code == CODE_VERIFIED }

    pub fn record_success(&mut self, ref_id: String) -> Result<()> {
        if self.is_verified() || self.ref_id.is_some() {
            return Err(OrderError::Conflict("Payment already verified".into()));
        }
        self.ref_id = Some(ref_id);
        self.code = CODE_VERIFIED;
        Ok(())
    }

    pub fn record_failure(&mut self, code: i32) -> Result<()> {
        if self.is_verified() {
            return Err(OrderError::Conflict("Payment already verified".into()));
        }
        self.code = code;
        Ok(())
    }
}

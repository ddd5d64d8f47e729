//! Promo Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pricing::Discount;
use crate::domain::value_objects::{Percentage, PromoCode};
use crate::{OrderError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promo {
    pub id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub limit: u32,
    pub percentage: Percentage,
    pub max_discount: Option<u64>,
}

impl Promo {
    pub fn discount(&self) -> Discount {
        Discount { percentage: self.percentage, max_discount: self.max_discount }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.expires_at <= now }

    pub fn ensure_redeemable(&self, now: DateTime<Utc>) -> Result<()> {
        if self.is_expired(now) { return Err(OrderError::PromoUnusable("Promo has expired".into())); }
        if self.limit == 0 { return Err(OrderError::PromoUnusable("Promo has no redemptions left".into())); }
        Ok(())
    }
}

/// Validated input for promo creation.
#[derive(Clone, Debug)]
pub struct NewPromo {
    pub code: PromoCode,
    pub expires_at: DateTime<Utc>,
    pub limit: u32,
    pub percentage: Percentage,
    pub max_discount: Option<u64>,
}

impl NewPromo {
    pub fn new(code: &str, expires_at: DateTime<Utc>, limit: u32, percentage: u8, max_discount: Option<u64>) -> Result<Self> {
        let code = PromoCode::new(code)?;
        let percentage = Percentage::new(percentage)
            .map_err(|e| OrderError::PromoUnusable(e.to_string()))?;
        if limit == 0 { return Err(OrderError::PromoUnusable("Promo limit must be positive".into())); }
        Ok(Self { code, expires_at, limit, percentage, max_discount })
    }

    pub fn into_promo(self) -> Promo {
        Promo {
            id: Uuid::now_v7(), code: self.code.as_str().to_string(), expires_at: self.expires_at,
            limit: self.limit, percentage: self.percentage, max_discount: self.max_discount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_promo_rejects_zero_percentage_and_limit() {
        let later = Utc::now() + Duration::days(1);
        assert!(matches!(NewPromo::new("P", later, 1, 0, None), Err(OrderError::PromoUnusable(_))));
        assert!(matches!(NewPromo::new("P", later, 0, 10, None), Err(OrderError::PromoUnusable(_))));
        assert!(matches!(NewPromo::new(" ", later, 1, 10, None), Err(OrderError::InvalidInput(_))));
    }

    #[test]
    fn test_redeemable() {
        let now = Utc::now();
        let mut promo = NewPromo::new("SPRING", now + Duration::hours(1), 1, 50, Some(40_000)).unwrap().into_promo();
        promo.ensure_redeemable(now).unwrap();
        assert!(promo.ensure_redeemable(now + Duration::hours(2)).is_err());
        promo.limit = 0;
        assert!(promo.ensure_redeemable(now).is_err());
    }
}

//! Pricing engine
//!
//! Pure integer arithmetic in minor currency units. Every division truncates,
//! and the order of operations is fixed: discount first, then quantity.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ItemKind, Percentage};

/// Catalog prices of a single book.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookPrice {
    pub digital_price: u64,
    pub digital_discount: u8,
    pub physical_price: u64,
    pub physical_discount: u8,
}

/// A line as seen by the pricing engine.
#[derive(Clone, Copy, Debug)]
pub struct PricedLine {
    pub kind: ItemKind,
    pub quantity: u32,
    pub price: BookPrice,
}

/// Discount terms of an applied promo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Discount {
    pub percentage: Percentage,
    pub max_discount: Option<u64>,
}

fn discounted(price: u64, discount: u8) -> u64 {
    price * 100u64.saturating_sub(u64::from(discount)) / 100
}

pub fn line_total(line: &PricedLine) -> u64 {
    match line.kind {
        ItemKind::Digital => discounted(line.price.digital_price, line.price.digital_discount),
        ItemKind::Physical => {
            discounted(line.price.physical_price, line.price.physical_discount) * u64::from(line.quantity)
        }
    }
}

pub fn subtotal(lines: &[PricedLine]) -> u64 {
    lines.iter().map(line_total).sum()
}

pub fn apply_promo(subtotal: u64, discount: Option<&Discount>) -> u64 {
    let Some(discount) = discount else { return subtotal };
    if discount.percentage.is_full() {
        return 0;
    }
    let raw = subtotal * u64::from(discount.percentage.value()) / 100;
    let capped = discount.max_discount.map_or(raw, |cap| raw.min(cap));
    subtotal.saturating_sub(capped)
}

pub fn order_total(lines: &[PricedLine], discount: Option<&Discount>) -> u64 {
    apply_promo(subtotal(lines), discount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digital(price: u64, discount: u8) -> PricedLine {
        PricedLine { kind: ItemKind::Digital, quantity: 1, price: BookPrice { digital_price: price, digital_discount: discount, ..Default::default() } }
    }

    fn physical(price: u64, discount: u8, quantity: u32) -> PricedLine {
        PricedLine { kind: ItemKind::Physical, quantity, price: BookPrice { physical_price: price, physical_discount: discount, ..Default::default() } }
    }

    fn promo(percentage: u8, max_discount: Option<u64>) -> Discount {
        Discount { percentage: Percentage::new(percentage).unwrap(), max_discount }
    }

    #[test]
    fn test_digital_line() {
        assert_eq!(line_total(&digital(50_000, 10)), 45_000);
    }

    #[test]
    fn test_bundle_subtotal() {
        let lines = [digital(30_000, 0), physical(100_000, 20, 2)];
        assert_eq!(subtotal(&lines), 190_000);
    }

    #[test]
    fn test_discount_truncates_before_quantity() {
        // 999 * 67 / 100 = 669.33 -> 669, then * 3
        assert_eq!(line_total(&physical(999, 33, 3)), 2_007);
    }

    #[test]
    fn test_promo_cap() {
        assert_eq!(apply_promo(190_000, Some(&promo(50, Some(40_000)))), 150_000);
        assert_eq!(apply_promo(190_000, Some(&promo(10, Some(40_000)))), 171_000);
    }

    #[test]
    fn test_full_percentage_ignores_cap() {
        assert_eq!(apply_promo(190_000, Some(&promo(100, Some(1)))), 0);
    }

    #[test]
    fn test_no_promo() {
        assert_eq!(order_total(&[digital(1_000, 0)], None), 1_000);
        assert_eq!(order_total(&[], Some(&promo(30, None))), 0);
    }

    #[test]
    fn test_malformed_discount_does_not_underflow() {
        assert_eq!(line_total(&digital(1_000, 150)), 0);
    }
}

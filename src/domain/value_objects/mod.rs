//! Value Objects for the order core

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::OrderError;

/// Order lifecycle state. Integer codes are stable across external boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum OrderStatus {
    Created,
    Paid,
    Verified,
    Shipped,
}

impl OrderStatus {
    pub fn code(self) -> i16 {
        match self {
            Self::Created => 0,
            Self::Paid => 1,
            Self::Verified => 2,
            Self::Shipped => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Paid => "PAID",
            Self::Verified => "VERIFIED",
            Self::Shipped => "SHIPPED",
        }
    }
}

impl TryFrom<i16> for OrderStatus {
    type Error = ValueError;
    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Created),
            1 => Ok(Self::Paid),
            2 => Ok(Self::Verified),
            3 => Ok(Self::Shipped),
            other => Err(ValueError::UnknownStatus(other)),
        }
    }
}

impl From<OrderStatus> for i16 {
    fn from(s: OrderStatus) -> i16 { s.code() }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Kind of a stored line item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum ItemKind {
    Digital,
    Physical,
}

impl ItemKind {
    pub fn code(self) -> i16 { match self { Self::Digital => 0, Self::Physical => 1 } }
}

impl TryFrom<i16> for ItemKind {
    type Error = ValueError;
    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Digital),
            1 => Ok(Self::Physical),
            other => Err(ValueError::UnknownKind(other)),
        }
    }
}

impl From<ItemKind> for i16 {
    fn from(k: ItemKind) -> i16 { k.code() }
}

/// Kind as requested by a customer. `Bundle` exists only on input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum RequestedKind {
    Digital,
    Physical,
    Bundle,
}

impl RequestedKind {
    pub fn code(self) -> i16 {
        match self { Self::Digital => 0, Self::Physical => 1, Self::Bundle => 2 }
    }
    pub fn name(self) -> &'static str {
        match self { Self::Digital => "digital", Self::Physical => "physical", Self::Bundle => "bundle" }
    }
}

impl TryFrom<i16> for RequestedKind {
    type Error = ValueError;
    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Digital),
            1 => Ok(Self::Physical),
            2 => Ok(Self::Bundle),
            other => Err(ValueError::UnknownKind(other)),
        }
    }
}

impl From<RequestedKind> for i16 {
    fn from(k: RequestedKind) -> i16 { k.code() }
}

/// How a book is sold, as published by the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Availability {
    None,
    Digital,
    Physical,
    Bundle,
}

impl Availability {
    pub fn code(self) -> i16 {
        match self { Self::None => 0, Self::Digital => 1, Self::Physical => 2, Self::Bundle => 3 }
    }

    /// Whether a request of `kind` can be served for a book with this availability.
    pub fn admits(self, kind: RequestedKind) -> bool {
        match kind {
            RequestedKind::Digital => matches!(self, Self::Digital | Self::Bundle),
            RequestedKind::Physical => matches!(self, Self::Physical | Self::Bundle),
            RequestedKind::Bundle => self == Self::Bundle,
        }
    }
}

impl TryFrom<i16> for Availability {
    type Error = ValueError;
    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Digital),
            2 => Ok(Self::Physical),
            3 => Ok(Self::Bundle),
            other => Err(ValueError::UnknownAvailability(other)),
        }
    }
}

impl From<Availability> for i16 {
    fn from(a: Availability) -> i16 { a.code() }
}

/// Promo percentage in `(0, 100]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value == 0 || value > 100 { return Err(ValueError::PercentageOutOfRange(value)); }
        Ok(Self(value))
    }
    pub fn value(self) -> u8 { self.0 }
    pub fn is_full(self) -> bool { self.0 == 100 }
}

impl TryFrom<u8> for Percentage {
    type Error = ValueError;
    fn try_from(value: u8) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Percentage> for u8 {
    fn from(p: Percentage) -> u8 { p.0 }
}

/// Promo code value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromoCode(String);

impl PromoCode {
    pub fn new(value: impl Into<String>) -> Result<Self, ValueError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(ValueError::EmptyCode); }
        if value.len() > 64 { return Err(ValueError::CodeTooLong); }
        if value.chars().any(char::is_whitespace) { return Err(ValueError::CodeWhitespace); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for PromoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    UnknownStatus(i16),
    UnknownKind(i16),
    UnknownAvailability(i16),
    PercentageOutOfRange(u8),
    EmptyCode,
    CodeTooLong,
    CodeWhitespace,
}

impl std::error::Error for ValueError {}
impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStatus(c) => write!(f, "Unknown order status {}", c),
            Self::UnknownKind(c) => write!(f, "Unknown item kind {}", c),
            Self::UnknownAvailability(c) => write!(f, "Unknown availability {}", c),
            Self::PercentageOutOfRange(p) => write!(f, "Percentage {} outside 1..=100", p),
            Self::EmptyCode => write!(f, "Promo code empty"),
            Self::CodeTooLong => write!(f, "Promo code too long"),
            Self::CodeWhitespace => write!(f, "Promo code contains whitespace"),
        }
    }
}

impl From<ValueError> for OrderError {
    fn from(e: ValueError) -> Self { OrderError::InvalidInput(e.to_string()) }
}

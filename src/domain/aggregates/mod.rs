//! Order aggregates
pub mod cart;
pub mod order;
pub mod promo;
pub mod receipt;

pub use cart::{Cart, LineItem};
pub use order::Order;
pub use promo::{NewPromo, Promo};
pub use receipt::GatewayReceipt;

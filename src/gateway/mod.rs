//! Payment gateway capability
//!
//! The order core only needs the gateway's request/verify boundary. The
//! [`zarinpal::ZarinpalClient`] implements it over HTTP; tests inject their own.

pub mod zarinpal;

use async_trait::async_trait;
use thiserror::Error;

use crate::OrderError;

pub use zarinpal::ZarinpalClient;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: u64,
    pub callback_url: String,
    pub description: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

/// Outcome of a verification call. `code` is the gateway's status code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub code: i32,
    pub ref_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rejected with code {code}: {message}")]
    Rejected { code: i32, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<GatewayError> for OrderError {
    fn from(e: GatewayError) -> Self {
        tracing::warn!(error = %e, "Payment gateway call failed");
        OrderError::Upstream(e.to_string())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session and returns its authority.
    async fn request(&self, request: &PaymentRequest) -> Result<String, GatewayError>;

    async fn verify(&self, authority: &str, amount: u64) -> Result<Verification, GatewayError>;

    /// Where the customer is sent to pay for `authority`.
    fn pay_url(&self, authority: &str) -> String;
}

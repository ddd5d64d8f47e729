//! Zarinpal REST client (payment API v4, no SDK dependency)

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{GatewayError, PaymentGateway, PaymentRequest, Verification};

const LIVE_API: &str = "https://api.zarinpal.com/pg/v4/payment";
const LIVE_START_PAY: &str = "https://www.zarinpal.com/pg/StartPay";
const SANDBOX_API: &str = "https://sandbox.zarinpal.com/pg/v4/payment";
const SANDBOX_START_PAY: &str = "https://sandbox.zarinpal.com/pg/StartPay";

#[derive(Clone)]
pub struct ZarinpalClient {
    http: reqwest::Client,
    merchant_id: String,
    api_base: String,
    start_pay_base: String,
}

impl ZarinpalClient {
    pub fn new(merchant_id: impl Into<String>, sandbox: bool, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let (api_base, start_pay_base) = if sandbox { (SANDBOX_API, SANDBOX_START_PAY) } else { (LIVE_API, LIVE_START_PAY) };
        Ok(Self { http, merchant_id: merchant_id.into(), api_base: api_base.into(), start_pay_base: start_pay_base.into() })
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value, GatewayError> {
        let resp = self.http
            .post(format!("{}/{}", self.api_base, endpoint))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        Ok(resp.json().await?)
    }
}

/// Error object of a failed call: `{"data": [], "errors": {"code": -9, "message": "..."}}`.
fn error_of(resp: &Value) -> Option<(i32, String)> {
    let errors = resp.get("errors")?;
    let code = errors.get("code")?.as_i64()?;
    let message = errors.get("message").and_then(Value::as_str).unwrap_or_default();
    Some((code as i32, message.to_string()))
}

fn data_code(resp: &Value) -> Option<i32> {
    resp.get("data")?.get("code")?.as_i64().map(|c| c as i32)
}

pub(crate) fn parse_request(resp: &Value) -> Result<String, GatewayError> {
    if let Some((code, message)) = error_of(resp) {
        return Err(GatewayError::Rejected { code, message });
    }
    match data_code(resp) {
        Some(100) => resp["data"]["authority"]
            .as_str()
            .filter(|a| !a.is_empty())
            .map(String::from)
            .ok_or_else(|| GatewayError::Malformed(format!("missing authority: {resp}"))),
        Some(code) => Err(GatewayError::Rejected { code, message: resp["data"]["message"].as_str().unwrap_or_default().to_string() }),
        None => Err(GatewayError::Malformed(format!("missing code: {resp}"))),
    }
}

/// Non-success verification codes are outcomes, not transport errors.
pub(crate) fn parse_verify(resp: &Value) -> Result<Verification, GatewayError> {
    if let Some((code, _)) = error_of(resp) {
        return Ok(Verification { code, ref_id: None });
    }
    let code = data_code(resp).ok_or_else(|| GatewayError::Malformed(format!("missing code: {resp}")))?;
    let ref_id = match &resp["data"]["ref_id"] {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    if code == 100 && ref_id.is_none() {
        return Err(GatewayError::Malformed(format!("verified without ref_id: {resp}")));
    }
    Ok(Verification { code, ref_id })
}

#[async_trait]
impl PaymentGateway for ZarinpalClient {
    async fn request(&self, request: &PaymentRequest) -> Result<String, GatewayError> {
        let mut metadata = serde_json::Map::new();
        if let Some(email) = &request.email { metadata.insert("email".into(), json!(email)); }
        if let Some(mobile) = &request.mobile { metadata.insert("mobile".into(), json!(mobile)); }
        let body = json!({
            "merchant_id": self.merchant_id,
            "amount": request.amount,
            "callback_url": request.callback_url,
            "description": request.description,
            "metadata": metadata,
        });
        let resp = self.post("request.json", body).await?;
        parse_request(&resp)
    }

    async fn verify(&self, authority: &str, amount: u64) -> Result<Verification, GatewayError> {
        let body = json!({ "merchant_id": self.merchant_id, "amount": amount, "authority": authority });
        let resp = self.post("verify.json", body).await?;
        parse_verify(&resp)
    }

    fn pay_url(&self, authority: &str) -> String {
        format!("{}/{}", self.start_pay_base, authority)
    }
}

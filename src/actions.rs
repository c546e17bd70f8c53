//! Order placement, cancellation and leverage updates.
//!
//! These are UI-initiated, synchronous calls against the exchange endpoint.
//! Signing is an external collaborator behind the [`Signer`] trait; this
//! module only assembles action payloads, submits them, and reports
//! success or the exchange's rejection message. Failures never touch
//! shared state — the orchestrator surfaces them as a transient status
//! line.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::error::Error;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Signing collaborator. Implementations hold key material; this crate
/// never sees it.
pub trait Signer: Send + Sync {
    /// The account address actions are attributed to.
    fn address(&self) -> &str;

    /// Sign the canonical `(action, nonce)` payload, returning the
    /// signature object the exchange endpoint expects.
    fn sign(&self, action: &serde_json::Value, nonce: u64) -> Result<serde_json::Value, Error>;
}

/// Client for authenticated exchange actions.
pub struct ExchangeClient {
    http: reqwest::blocking::Client,
    base_url: String,
    signer: Box<dyn Signer>,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    status: String,
    #[serde(default)]
    response: serde_json::Value,
}

impl ExchangeClient {
    pub fn new(base_url: impl Into<String>, signer: Box<dyn Signer>) -> Result<Self, Error> {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            signer,
        })
    }

    pub fn address(&self) -> &str {
        self.signer.address()
    }

    /// Place a limit order (GTC). `asset` is the resolved universe index.
    pub fn place_order(
        &self,
        asset: u32,
        is_buy: bool,
        px: Decimal,
        sz: Decimal,
        reduce_only: bool,
    ) -> Result<(), Error> {
        let action = serde_json::json!({
            "type": "order",
            "orders": [{
                "a": asset,
                "b": is_buy,
                "p": px.to_string(),
                "s": sz.to_string(),
                "r": reduce_only,
                "t": { "limit": { "tif": "Gtc" } },
            }],
            "grouping": "na",
        });
        self.submit(action)
    }

    pub fn cancel_order(&self, asset: u32, oid: u64) -> Result<(), Error> {
        let action = serde_json::json!({
            "type": "cancel",
            "cancels": [{ "a": asset, "o": oid }],
        });
        self.submit(action)
    }

    pub fn update_leverage(&self, asset: u32, leverage: u32, cross: bool) -> Result<(), Error> {
        let action = serde_json::json!({
            "type": "updateLeverage",
            "asset": asset,
            "isCross": cross,
            "leverage": leverage,
        });
        self.submit(action)
    }

    fn submit(&self, action: serde_json::Value) -> Result<(), Error> {
        let nonce = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let signature = self.signer.sign(&action, nonce)?;
        let body = serde_json::json!({
            "action": action,
            "nonce": nonce,
            "signature": signature,
        });
        let response: ExchangeResponse = self
            .http
            .post(format!("{}/exchange", self.base_url))
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;
        check_response(response)
    }
}

/// An "ok" status can still wrap per-order rejections; both layers are
/// checked here.
fn check_response(response: ExchangeResponse) -> Result<(), Error> {
    if response.status != "ok" {
        let msg = response
            .response
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| response.response.to_string());
        return Err(Error::ActionRejected(msg));
    }
    if let Some(statuses) = response
        .response
        .pointer("/data/statuses")
        .and_then(|s| s.as_array())
    {
        for status in statuses {
            if let Some(err) = status.get("error").and_then(|e| e.as_str()) {
                return Err(Error::ActionRejected(err.to_string()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_passes() {
        let resp: ExchangeResponse = serde_json::from_str(
            r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"resting":{"oid":1}}]}}}"#,
        )
        .unwrap();
        assert!(check_response(resp).is_ok());
    }

    #[test]
    fn err_status_surfaces_message() {
        let resp: ExchangeResponse =
            serde_json::from_str(r#"{"status":"err","response":"Insufficient margin"}"#).unwrap();
        match check_response(resp) {
            Err(Error::ActionRejected(msg)) => assert_eq!(msg, "Insufficient margin"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn per_order_rejection_surfaces_message() {
        let resp: ExchangeResponse = serde_json::from_str(
            r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"error":"Price too far from oracle"}]}}}"#,
        )
        .unwrap();
        match check_response(resp) {
            Err(Error::ActionRejected(msg)) => assert!(msg.contains("oracle")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}

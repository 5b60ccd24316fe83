//! Gateway adapters.
//!
//! Each external payment provider is wrapped behind [`GatewayAdapter`], a
//! uniform operation set. Adapters own their provider's wire format, error
//! vocabulary and webhook signature scheme; everything they emit is already
//! normalized-friendly (native status strings, user-safe messages) and
//! must never contain raw card data or full tokens.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::domain::{Gateway, PaymentMethod};

pub mod banktransfer;
pub mod cardstream;
pub mod walletpay;

pub use banktransfer::BankTransferAdapter;
pub use cardstream::CardstreamAdapter;
pub use walletpay::WalletpayAdapter;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway considered the request and said no. `message` is already
    /// user-safe.
    #[error("{message}")]
    Rejected {
        message: String,
        decline_code: Option<String>,
    },

    /// Timeout, rate limit, 5xx or open circuit. Retryable.
    #[error("{0}")]
    Unavailable(String),

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("malformed gateway response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Unsupported(&'static str),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Unavailable("gateway request timed out".to_string())
        } else {
            // Never echo the URL: reqwest errors can carry query fragments.
            GatewayError::Unavailable(format!(
                "gateway request failed: {}",
                err.without_url()
            ))
        }
    }
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// Input to `create_intent`, shared by all gateways.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub order_id: String,
    pub customer_ref: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Value>,
    /// Internal request id; forwarded as the gateway idempotency key so a
    /// network retry of the same logical call cannot double-charge.
    pub request_id: String,
    /// Result of the strong-authentication decision for this call.
    pub strong_auth: bool,
}

/// The gateway's handle for a freshly created payment.
#[derive(Debug, Clone)]
pub struct IntentHandle {
    pub intent_id: String,
    pub native_status: String,
    pub requires_action: bool,
    /// Client secret, approval URL or remittance details.
    pub client_token: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
}

/// Outcome of a confirm or capture call.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub intent_id: String,
    pub native_status: String,
    pub requires_action: bool,
    pub client_token: Option<String>,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
}

/// A webhook notification whose signature has been verified.
/// Produced only by `verify_webhook`; consumed once, never persisted.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    pub gateway: Gateway,
    pub event_id: String,
    pub event_type: String,
    pub transaction_id: String,
    pub order_id: Option<String>,
    pub native_status: String,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub raw: Value,
}

#[async_trait::async_trait]
pub trait GatewayAdapter: Send + Sync {
    async fn create_intent(&self, req: IntentRequest) -> Result<IntentHandle, GatewayError>;

    async fn confirm_intent(
        &self,
        intent_id: &str,
        method_ref: Option<&str>,
        return_url: Option<&str>,
        request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError>;

    /// Second phase for two-phase gateways; others reject it.
    async fn capture_order(
        &self,
        intent_id: &str,
        request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError>;

    async fn list_methods(&self, customer_ref: &str) -> Result<Vec<PaymentMethod>, GatewayError>;

    async fn attach_method(
        &self,
        customer_ref: &str,
        method_ref: &str,
        as_default: bool,
    ) -> Result<(), GatewayError>;

    async fn detach_method(&self, method_ref: &str) -> Result<(), GatewayError>;

    /// Checks authenticity of an inbound notification and extracts the
    /// normalization-ready event.
    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<VerifiedEvent, GatewayError>;
}

#[cfg(test)]
pub(crate) fn hmac_sha256(secret: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time comparison via the MAC verifier itself.
pub(crate) fn hmac_sha256_verify(secret: &[u8], data: &[u8], signature: &[u8]) -> bool {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(data);
    mac.verify_slice(signature).is_ok()
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

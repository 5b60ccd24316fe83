//! Offline bank-transfer adapter.
//!
//! No network I/O: creating an "intent" synthesizes a deterministic payment
//! reference from the order id and returns the configured remittance
//! details. The transaction stays `pending` until the back office reports
//! the incoming transfer through the notification route, which is
//! authenticated with a shared-secret HMAC like any other webhook.

use axum::http::HeaderMap;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::BankTransferConfig;
use crate::domain::{Gateway, PaymentMethod};

use super::{
    header_str, hmac_sha256_verify, ConfirmOutcome, GatewayAdapter, GatewayError, IntentHandle,
    IntentRequest, VerifiedEvent,
};

pub struct BankTransferAdapter {
    account_holder: String,
    iban: String,
    bic: String,
    notification_secret: String,
}

impl BankTransferAdapter {
    pub fn new(config: BankTransferConfig) -> Self {
        Self {
            account_holder: config.account_holder,
            iban: config.iban,
            bic: config.bic,
            notification_secret: config.notification_secret,
        }
    }
}

/// Deterministic remittance reference: the same order id always yields the
/// same reference, so a re-submitted checkout cannot mint a second one.
pub fn payment_reference(order_id: &str) -> String {
    let digest = Sha256::digest(order_id.as_bytes());
    format!("BT-{}-{}", order_id.to_uppercase(), hex::encode(&digest[..2]))
}

#[async_trait::async_trait]
impl GatewayAdapter for BankTransferAdapter {
    async fn create_intent(&self, req: IntentRequest) -> Result<IntentHandle, GatewayError> {
        let reference = payment_reference(&req.order_id);
        let remittance = json!({
            "reference": reference,
            "account_holder": self.account_holder,
            "iban": self.iban,
            "bic": self.bic,
        });

        Ok(IntentHandle {
            intent_id: reference,
            native_status: "pending".to_string(),
            requires_action: false,
            client_token: Some(remittance.to_string()),
            amount_minor: Some(req.amount_minor),
            currency: Some(req.currency),
        })
    }

    async fn confirm_intent(
        &self,
        _intent_id: &str,
        _method_ref: Option<&str>,
        _return_url: Option<&str>,
        _request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError> {
        Err(GatewayError::Unsupported(
            "bank transfers are settled by the back office, not confirmed by the buyer",
        ))
    }

    async fn capture_order(
        &self,
        _intent_id: &str,
        _request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError> {
        Err(GatewayError::Unsupported(
            "bank transfers have no capture phase",
        ))
    }

    async fn list_methods(&self, _customer_ref: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        Ok(Vec::new())
    }

    async fn attach_method(
        &self,
        _customer_ref: &str,
        _method_ref: &str,
        _as_default: bool,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn detach_method(&self, _method_ref: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported(
            "bank transfers have no stored payment methods",
        ))
    }

    /// Back-office notifications carry `Bank-Notification-Signature`, a hex
    /// HMAC-SHA256 over the raw body with the shared secret.
    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<VerifiedEvent, GatewayError> {
        let signature = header_str(headers, "Bank-Notification-Signature")
            .ok_or_else(|| GatewayError::InvalidSignature("missing notification signature".into()))?;
        let signature = hex::decode(signature)
            .map_err(|_| GatewayError::InvalidSignature("signature is not hex".into()))?;

        if !hmac_sha256_verify(self.notification_secret.as_bytes(), body, &signature) {
            return Err(GatewayError::InvalidSignature("signature mismatch".into()));
        }

        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidResponse(format!("notification is not JSON: {e}")))?;

        let event_id = raw["event_id"]
            .as_str()
            .ok_or_else(|| GatewayError::InvalidResponse("notification has no event_id".into()))?
            .to_string();
        let order_id = raw["order_id"]
            .as_str()
            .ok_or_else(|| GatewayError::InvalidResponse("notification has no order_id".into()))?
            .to_string();
        let reference = raw["reference"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| payment_reference(&order_id));

        Ok(VerifiedEvent {
            gateway: Gateway::BankTransfer,
            event_id,
            event_type: "bank_transfer.notification".to_string(),
            transaction_id: reference,
            order_id: Some(order_id),
            native_status: raw["status"].as_str().unwrap_or_default().to_string(),
            amount_minor: raw["amount_minor"].as_i64(),
            currency: raw["currency"].as_str().map(str::to_string),
            raw,
        })
    }
}

//! Redirect wallet adapter.
//!
//! Two-phase gateway: `create_intent` opens a wallet order and hands back
//! an approval URL the buyer is redirected to; once the buyer approves,
//! `capture_order` collects the money. Amounts cross this wire as decimal
//! strings and are converted at the boundary.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::config::WalletpayConfig;
use crate::domain::{Gateway, PaymentMethod};

use super::{
    header_str, hmac_sha256_verify, ConfirmOutcome, GatewayAdapter, GatewayError, IntentHandle,
    IntentRequest, VerifiedEvent,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct WalletpayAdapter {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    webhook_secret: String,
}

impl WalletpayAdapter {
    pub fn new(config: WalletpayConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id,
            client_secret: config.client_secret,
            webhook_secret: config.webhook_secret,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .send()
            .await
            .map_err(GatewayError::from)?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
        } else {
            let envelope = response.json::<WalletError>().await.unwrap_or_default();
            Err(classify(status, envelope))
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for WalletpayAdapter {
    async fn create_intent(&self, req: IntentRequest) -> Result<IntentHandle, GatewayError> {
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": req.order_id,
                "custom_id": req.order_id,
                "description": req.description,
                "amount": {
                    "currency_code": req.currency,
                    "value": format_decimal(req.amount_minor),
                },
            }],
        });

        let order: WalletOrderResponse = self
            .execute(
                self.http
                    .post(self.url("/v2/checkout/orders"))
                    .header("Wallet-Request-Id", &req.request_id)
                    .json(&body),
            )
            .await?;

        let approval_url = order
            .links
            .iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href.clone());

        Ok(IntentHandle {
            intent_id: order.id,
            requires_action: approval_url.is_some(),
            native_status: order.status,
            client_token: approval_url,
            amount_minor: Some(req.amount_minor),
            currency: Some(req.currency),
        })
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        _method_ref: Option<&str>,
        _return_url: Option<&str>,
        request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError> {
        // Post-approval confirmation IS the capture for this gateway.
        self.capture_order(intent_id, request_id).await
    }

    async fn capture_order(
        &self,
        intent_id: &str,
        request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError> {
        let order: WalletOrderResponse = self
            .execute(
                self.http
                    .post(self.url(&format!("/v2/checkout/orders/{intent_id}/capture")))
                    .header("Wallet-Request-Id", request_id)
                    .json(&json!({})),
            )
            .await?;

        let amount = order.purchase_units.first().and_then(|unit| unit.amount.as_ref());

        Ok(ConfirmOutcome {
            intent_id: order.id,
            requires_action: false,
            native_status: order.status,
            client_token: None,
            amount_minor: amount.and_then(|a| parse_decimal_minor(&a.value)),
            currency: amount.map(|a| a.currency_code.clone()),
        })
    }

    async fn list_methods(&self, _customer_ref: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        // Redirect wallets hold no attachable instruments on our side.
        Ok(Vec::new())
    }

    async fn attach_method(
        &self,
        customer_ref: &str,
        _method_ref: &str,
        _as_default: bool,
    ) -> Result<(), GatewayError> {
        tracing::debug!(customer = %customer_ref, "wallet gateway has no instruments to attach");
        Ok(())
    }

    async fn detach_method(&self, _method_ref: &str) -> Result<(), GatewayError> {
        Err(GatewayError::Unsupported(
            "the wallet gateway does not store payment methods",
        ))
    }

    /// Scheme: `Wallet-Transmission-Sig` carries a base64 HMAC-SHA256 over
    /// `"{transmission_id}|{transmission_time}|{raw body}"`.
    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<VerifiedEvent, GatewayError> {
        let transmission_id = header_str(headers, "Wallet-Transmission-Id")
            .ok_or_else(|| GatewayError::InvalidSignature("missing transmission id".into()))?;
        let transmission_time = header_str(headers, "Wallet-Transmission-Time")
            .ok_or_else(|| GatewayError::InvalidSignature("missing transmission time".into()))?;
        let signature = header_str(headers, "Wallet-Transmission-Sig")
            .ok_or_else(|| GatewayError::InvalidSignature("missing transmission signature".into()))?;

        let mut signed_payload = format!("{transmission_id}|{transmission_time}|").into_bytes();
        signed_payload.extend_from_slice(body);

        let signature = BASE64
            .decode(signature)
            .map_err(|_| GatewayError::InvalidSignature("signature is not base64".into()))?;
        if !hmac_sha256_verify(self.webhook_secret.as_bytes(), &signed_payload, &signature) {
            return Err(GatewayError::InvalidSignature("signature mismatch".into()));
        }

        let raw: Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidResponse(format!("webhook body is not JSON: {e}")))?;

        let event_id = raw["id"]
            .as_str()
            .ok_or_else(|| GatewayError::InvalidResponse("event has no id".into()))?
            .to_string();
        let resource = &raw["resource"];
        let transaction_id = resource["id"]
            .as_str()
            .ok_or_else(|| GatewayError::InvalidResponse("event has no resource id".into()))?
            .to_string();
        let amount = &resource["amount"];

        Ok(VerifiedEvent {
            gateway: Gateway::Walletpay,
            event_id,
            event_type: raw["event_type"].as_str().unwrap_or_default().to_string(),
            transaction_id,
            order_id: resource["custom_id"].as_str().map(str::to_string),
            native_status: resource["status"].as_str().unwrap_or_default().to_string(),
            amount_minor: amount["value"].as_str().and_then(parse_decimal_minor),
            currency: amount["currency_code"].as_str().map(str::to_string),
            raw,
        })
    }
}

fn classify(status: reqwest::StatusCode, error: WalletError) -> GatewayError {
    if status.as_u16() == 429 {
        return GatewayError::Unavailable(
            "Too many requests reached the wallet provider. Please retry shortly.".to_string(),
        );
    }
    if status.is_server_error() {
        return GatewayError::Unavailable(
            "The wallet provider is temporarily unavailable.".to_string(),
        );
    }
    GatewayError::Rejected {
        message: user_message(&error.name).to_string(),
        decline_code: if error.name.is_empty() { None } else { Some(error.name) },
    }
}

fn user_message(name: &str) -> &'static str {
    match name {
        "INSTRUMENT_DECLINED" => "The selected funding source was declined.",
        "PAYER_ACTION_REQUIRED" => "The payment has not been approved yet.",
        "ORDER_EXPIRED" => "The payment session has expired.",
        "ORDER_ALREADY_CAPTURED" => "This payment was already captured.",
        _ => "The payment could not be processed.",
    }
}

/// Minor units to a two-decimal wire string: 5000 -> "50.00".
fn format_decimal(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}

/// Two-decimal wire string back to minor units: "50.00" -> 5000.
fn parse_decimal_minor(value: &str) -> Option<i64> {
    let (units, cents) = match value.split_once('.') {
        Some((units, cents)) => (units, cents),
        None => (value, ""),
    };
    let units: i64 = units.parse().ok()?;
    let cents: i64 = match cents.len() {
        0 => 0,
        1 => cents.parse::<i64>().ok()? * 10,
        2 => cents.parse().ok()?,
        _ => return None,
    };
    Some(units * 100 + cents)
}

#[derive(Debug, Deserialize)]
struct WalletOrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<WalletLink>,
    #[serde(default)]
    purchase_units: Vec<WalletPurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct WalletLink {
    rel: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct WalletPurchaseUnit {
    #[serde(default)]
    amount: Option<WalletAmount>,
}

#[derive(Debug, Deserialize)]
struct WalletAmount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct WalletError {
    #[serde(default)]
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::hmac_sha256;

    fn adapter_for(base_url: &str) -> WalletpayAdapter {
        WalletpayAdapter::new(WalletpayConfig {
            base_url: base_url.to_string(),
            client_id: "client_x".to_string(),
            client_secret: "secret_x".to_string(),
            webhook_secret: "wallet_whsec".to_string(),
        })
    }

    #[test]
    fn decimal_conversion_round_trips() {
        assert_eq!(format_decimal(5000), "50.00");
        assert_eq!(format_decimal(99), "0.99");
        assert_eq!(parse_decimal_minor("50.00"), Some(5000));
        assert_eq!(parse_decimal_minor("0.99"), Some(99));
        assert_eq!(parse_decimal_minor("12"), Some(1200));
        assert_eq!(parse_decimal_minor("1.5"), Some(150));
        assert_eq!(parse_decimal_minor("1.234"), None);
    }

    #[tokio::test]
    async fn create_intent_returns_approval_url() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/checkout/orders")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"5O190127TN","status":"CREATED","links":[{"rel":"self","href":"https://wallet.example/orders/5O190127TN"},{"rel":"approve","href":"https://wallet.example/approve/5O190127TN"}]}"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server.url());
        let handle = adapter
            .create_intent(IntentRequest {
                amount_minor: 5000,
                currency: "EUR".to_string(),
                order_id: "ORD-1".to_string(),
                customer_ref: None,
                description: Some("Order ORD-1".to_string()),
                metadata: None,
                request_id: "req-1".to_string(),
                strong_auth: false,
            })
            .await
            .unwrap();

        assert_eq!(handle.intent_id, "5O190127TN");
        assert_eq!(handle.native_status, "CREATED");
        assert!(handle.requires_action);
        assert_eq!(
            handle.client_token.as_deref(),
            Some("https://wallet.example/approve/5O190127TN")
        );
    }

    #[tokio::test]
    async fn capture_parses_decimal_amount() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/checkout/orders/5O190127TN/capture")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"5O190127TN","status":"COMPLETED","purchase_units":[{"amount":{"currency_code":"EUR","value":"50.00"}}]}"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server.url());
        let outcome = adapter.capture_order("5O190127TN", "req-2").await.unwrap();

        assert_eq!(outcome.native_status, "COMPLETED");
        assert_eq!(outcome.amount_minor, Some(5000));
        assert_eq!(outcome.currency.as_deref(), Some("EUR"));
    }

    #[tokio::test]
    async fn declined_instrument_maps_to_user_safe_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v2/checkout/orders/5O190127TN/capture")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"INSTRUMENT_DECLINED","message":"raw internal details"}"#)
            .create_async()
            .await;

        let adapter = adapter_for(&server.url());
        let err = adapter.capture_order("5O190127TN", "req-2").await.unwrap_err();

        match err {
            GatewayError::Rejected { message, decline_code } => {
                assert_eq!(message, "The selected funding source was declined.");
                assert_eq!(decline_code.as_deref(), Some("INSTRUMENT_DECLINED"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    fn signed_headers(body: &[u8], secret: &str) -> HeaderMap {
        let transmission_id = "trans-1";
        let transmission_time = "2026-08-06T12:00:00Z";
        let mut payload = format!("{transmission_id}|{transmission_time}|").into_bytes();
        payload.extend_from_slice(body);
        let signature = BASE64.encode(hmac_sha256(secret.as_bytes(), &payload));

        let mut headers = HeaderMap::new();
        headers.insert("Wallet-Transmission-Id", transmission_id.parse().unwrap());
        headers.insert("Wallet-Transmission-Time", transmission_time.parse().unwrap());
        headers.insert("Wallet-Transmission-Sig", signature.parse().unwrap());
        headers
    }

    #[test]
    fn valid_webhook_is_accepted() {
        let adapter = adapter_for("http://unused.example");
        let body = serde_json::to_vec(&serde_json::json!({
            "id": "WH-1",
            "event_type": "CHECKOUT.ORDER.COMPLETED",
            "resource": {
                "id": "5O190127TN",
                "status": "COMPLETED",
                "custom_id": "ORD-1",
                "amount": { "currency_code": "EUR", "value": "50.00" }
            }
        }))
        .unwrap();

        let event = adapter
            .verify_webhook(&signed_headers(&body, "wallet_whsec"), &body)
            .unwrap();
        assert_eq!(event.event_id, "WH-1");
        assert_eq!(event.native_status, "COMPLETED");
        assert_eq!(event.order_id.as_deref(), Some("ORD-1"));
        assert_eq!(event.amount_minor, Some(5000));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let adapter = adapter_for("http://unused.example");
        let body = br#"{"id":"WH-1","resource":{"id":"x"}}"#.to_vec();

        let err = adapter
            .verify_webhook(&signed_headers(&body, "not_the_secret"), &body)
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }
}

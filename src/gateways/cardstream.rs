//! Card processor adapter.
//!
//! Speaks the processor's intent-based API: create an intent, confirm it
//! with a payment method reference, and listen for asynchronous status
//! webhooks. Outbound calls carry the orchestrator's request id as the
//! `Idempotency-Key` header and run behind a circuit breaker on top of the
//! client timeout.

use chrono::Utc;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use axum::http::HeaderMap;

use crate::config::CardstreamConfig;
use crate::domain::{Gateway, PaymentMethod};

use super::{
    header_str, hmac_sha256_verify, ConfirmOutcome, GatewayAdapter, GatewayError, IntentHandle,
    IntentRequest, VerifiedEvent,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Minor-unit threshold above which strong customer authentication applies
/// in regulated regions.
pub const SCA_AMOUNT_THRESHOLD_MINOR: i64 = 3000;

/// The strong-authentication decision. Pure function of the call's inputs;
/// nothing is cached, so a changed amount is re-evaluated from scratch.
pub fn requires_strong_authentication(
    amount_minor: i64,
    billing_country: &str,
    regulated_countries: &[String],
) -> bool {
    amount_minor > SCA_AMOUNT_THRESHOLD_MINOR
        && regulated_countries
            .iter()
            .any(|country| country.eq_ignore_ascii_case(billing_country))
}

pub struct CardstreamAdapter {
    http: Client,
    base_url: String,
    secret_key: String,
    webhook_secret: String,
    breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl CardstreamAdapter {
    pub fn new(config: CardstreamConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(5, backoff);
        let breaker = BreakerConfig::new().failure_policy(policy).build();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key,
            webhook_secret: config.webhook_secret,
            breaker,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let call = async move {
            let response = request.send().await.map_err(GatewayError::from)?;
            let status = response.status();
            if status.is_success() {
                response
                    .json::<T>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
            } else {
                let envelope = response.json::<ApiErrorEnvelope>().await.unwrap_or_default();
                Err(classify(status, envelope.error))
            }
        };

        // Declines are answers, not failures; only availability problems
        // feed the breaker.
        match self
            .breaker
            .call_with(|e: &GatewayError| e.is_retryable(), call)
            .await
        {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(GatewayError::Unavailable(
                "card processor circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait::async_trait]
impl GatewayAdapter for CardstreamAdapter {
    async fn create_intent(&self, req: IntentRequest) -> Result<IntentHandle, GatewayError> {
        let mut metadata = req.metadata.clone().unwrap_or_else(|| json!({}));
        if let Some(map) = metadata.as_object_mut() {
            map.insert("order_id".to_string(), json!(req.order_id));
        }

        let body = CreateIntentBody {
            amount: req.amount_minor,
            currency: req.currency.to_lowercase(),
            customer: req.customer_ref.clone(),
            description: req.description.clone(),
            metadata,
            request_three_d_secure: if req.strong_auth { "required" } else { "automatic" },
        };

        let intent: IntentResponse = self
            .execute(
                self.http
                    .post(self.url("/v1/payment_intents"))
                    .bearer_auth(&self.secret_key)
                    .header("Idempotency-Key", &req.request_id)
                    .json(&body),
            )
            .await?;

        Ok(intent.into_handle())
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        method_ref: Option<&str>,
        return_url: Option<&str>,
        request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError> {
        let body = json!({
            "payment_method": method_ref,
            "return_url": return_url,
        });

        let intent: IntentResponse = self
            .execute(
                self.http
                    .post(self.url(&format!("/v1/payment_intents/{intent_id}/confirm")))
                    .bearer_auth(&self.secret_key)
                    .header("Idempotency-Key", request_id)
                    .json(&body),
            )
            .await?;

        Ok(intent.into_outcome())
    }

    async fn capture_order(
        &self,
        _intent_id: &str,
        _request_id: &str,
    ) -> Result<ConfirmOutcome, GatewayError> {
        Err(GatewayError::Unsupported(
            "the card processor captures on confirm",
        ))
    }

    async fn list_methods(&self, customer_ref: &str) -> Result<Vec<PaymentMethod>, GatewayError> {
        let listing: MethodListing = self
            .execute(
                self.http
                    .get(self.url(&format!("/v1/customers/{customer_ref}/payment_methods")))
                    .bearer_auth(&self.secret_key),
            )
            .await?;

        Ok(listing.data.into_iter().map(MethodEntry::into_method).collect())
    }

    async fn attach_method(
        &self,
        customer_ref: &str,
        method_ref: &str,
        as_default: bool,
    ) -> Result<(), GatewayError> {
        let body = json!({
            "customer": customer_ref,
            "set_as_default": as_default,
        });

        let _: Value = self
            .execute(
                self.http
                    .post(self.url(&format!("/v1/payment_methods/{method_ref}/attach")))
                    .bearer_auth(&self.secret_key)
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn detach_method(&self, method_ref: &str) -> Result<(), GatewayError> {
        let _: Value = self
            .execute(
                self.http
                    .post(self.url(&format!("/v1/payment_methods/{method_ref}/detach")))
                    .bearer_auth(&self.secret_key),
            )
            .await?;
        Ok(())
    }

    /// Scheme: `Webhook-Signature: t=<unix>,v1=<hex hmac-sha256>` where the
    /// MAC is computed over `"{t}.{raw body}"`. Stale timestamps are
    /// rejected to bound replays.
    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<VerifiedEvent, GatewayError> {
        let header = header_str(headers, "Webhook-Signature")
            .ok_or_else(|| GatewayError::InvalidSignature("missing Webhook-Signature header".into()))?;

        let (timestamp, signature) = parse_signature_header(header)?;

        let age = Utc::now().timestamp() - timestamp;
        if age.abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(GatewayError::InvalidSignature(
                "timestamp outside tolerance".into(),
            ));
        }

        let mut signed_payload = format!("{timestamp}.").into_bytes();
        signed_payload.extend_from_slice(body);

        let signature = hex::decode(signature)
            .map_err(|_| GatewayError::InvalidSignature("signature is not hex".into()))?;
        if !hmac_sha256_verify(self.webhook_secret.as_bytes(), &signed_payload, &signature) {
            return Err(GatewayError::InvalidSignature("signature mismatch".into()));
        }

        parse_event(body)
    }
}

fn parse_signature_header(header: &str) -> Result<(i64, &str), GatewayError> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }
    match (timestamp, signature) {
        (Some(t), Some(v1)) => Ok((t, v1)),
        _ => Err(GatewayError::InvalidSignature(
            "expected t=<unix>,v1=<hex> header".into(),
        )),
    }
}

fn parse_event(body: &[u8]) -> Result<VerifiedEvent, GatewayError> {
    let raw: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidResponse(format!("webhook body is not JSON: {e}")))?;

    let event_id = raw["id"]
        .as_str()
        .ok_or_else(|| GatewayError::InvalidResponse("event has no id".into()))?
        .to_string();
    let event_type = raw["type"].as_str().unwrap_or_default().to_string();
    let object = &raw["data"]["object"];
    let transaction_id = object["id"]
        .as_str()
        .ok_or_else(|| GatewayError::InvalidResponse("event has no object id".into()))?
        .to_string();

    // Dispute events reference the intent but carry the dispute's own
    // status; collapse them into one native marker.
    let native_status = if event_type.contains("dispute") {
        "dispute_created".to_string()
    } else {
        object["status"].as_str().unwrap_or_default().to_string()
    };

    Ok(VerifiedEvent {
        gateway: Gateway::Cardstream,
        event_id,
        event_type,
        transaction_id,
        order_id: object["metadata"]["order_id"].as_str().map(str::to_string),
        native_status,
        amount_minor: object["amount"].as_i64(),
        currency: object["currency"].as_str().map(str::to_uppercase),
        raw,
    })
}

fn classify(status: reqwest::StatusCode, error: ApiError) -> GatewayError {
    if status.as_u16() == 429 || error.code == "rate_limit" {
        return GatewayError::Unavailable(
            "Too many requests reached the card processor. Please retry shortly.".to_string(),
        );
    }
    if status.is_server_error() {
        return GatewayError::Unavailable(
            "The card processor is temporarily unavailable.".to_string(),
        );
    }
    let code = error.decline_code.clone().unwrap_or(error.code);
    GatewayError::Rejected {
        message: user_message(&code).to_string(),
        decline_code: if code.is_empty() { None } else { Some(code) },
    }
}

/// Fixed, user-safe messages per decline vocabulary entry. Raw gateway
/// messages never reach the caller.
fn user_message(code: &str) -> &'static str {
    match code {
        "card_declined" => "The card was declined.",
        "insufficient_funds" => "The card has insufficient funds.",
        "expired_card" => "The card has expired.",
        "incorrect_cvc" | "invalid_cvc" => "The card's security code is invalid.",
        "processing_error" => "An error occurred while processing the card. Please try again.",
        "authentication_required" => {
            "Additional authentication is required to complete this payment."
        }
        _ => "The payment could not be processed.",
    }
}

#[derive(Debug, Serialize)]
struct CreateIntentBody {
    amount: i64,
    currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    metadata: Value,
    request_three_d_secure: &'static str,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

impl IntentResponse {
    fn into_handle(self) -> IntentHandle {
        IntentHandle {
            requires_action: self.status == "requires_action",
            native_status: self.status,
            intent_id: self.id,
            client_token: self.client_secret,
            amount_minor: self.amount,
            currency: self.currency.map(|c| c.to_uppercase()),
        }
    }

    fn into_outcome(self) -> ConfirmOutcome {
        ConfirmOutcome {
            requires_action: self.status == "requires_action",
            native_status: self.status,
            intent_id: self.id,
            client_token: self.client_secret,
            amount_minor: self.amount,
            currency: self.currency.map(|c| c.to_uppercase()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    decline_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MethodListing {
    #[serde(default)]
    data: Vec<MethodEntry>,
}

#[derive(Debug, Deserialize)]
struct MethodEntry {
    id: String,
    #[serde(default)]
    card: CardDetails,
    #[serde(default)]
    is_default: bool,
}

#[derive(Debug, Default, Deserialize)]
struct CardDetails {
    #[serde(default)]
    brand: String,
    #[serde(default)]
    last4: String,
    #[serde(default)]
    exp_month: u8,
    #[serde(default)]
    exp_year: u16,
}

impl MethodEntry {
    fn into_method(self) -> PaymentMethod {
        PaymentMethod {
            id: self.id,
            brand: self.card.brand,
            last4: self.card.last4,
            exp_month: self.card.exp_month,
            exp_year: self.card.exp_year,
            is_default: self.is_default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateways::hmac_sha256;

    fn adapter_for(base_url: &str) -> CardstreamAdapter {
        CardstreamAdapter::new(CardstreamConfig {
            base_url: base_url.to_string(),
            secret_key: "sk_test_xxx".to_string(),
            webhook_secret: "whsec_test123".to_string(),
        })
    }

    fn intent_request(amount: i64) -> IntentRequest {
        IntentRequest {
            amount_minor: amount,
            currency: "EUR".to_string(),
            order_id: "ORD-1".to_string(),
            customer_ref: None,
            description: None,
            metadata: None,
            request_id: "req-1".to_string(),
            strong_auth: false,
        }
    }

    #[test]
    fn sca_is_required_above_threshold_in_regulated_country() {
        let regulated = vec!["DE".to_string(), "FR".to_string()];
        assert!(!requires_strong_authentication(2999, "DE", &regulated));
        assert!(!requires_strong_authentication(3000, "DE", &regulated));
        assert!(requires_strong_authentication(3001, "DE", &regulated));
    }

    #[test]
    fn sca_never_applies_outside_regulated_countries() {
        let regulated = vec!["DE".to_string()];
        assert!(!requires_strong_authentication(3001, "US", &regulated));
        assert!(!requires_strong_authentication(1_000_000, "JP", &regulated));
    }

    #[tokio::test]
    async fn create_intent_returns_handle() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/payment_intents")
            .match_header("idempotency-key", "req-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"pi_123","status":"requires_confirmation","client_secret":"pi_123_secret_x","amount":5000,"currency":"eur"}"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server.url());
        let handle = adapter.create_intent(intent_request(5000)).await.unwrap();

        assert_eq!(handle.intent_id, "pi_123");
        assert_eq!(handle.native_status, "requires_confirmation");
        assert_eq!(handle.client_token.as_deref(), Some("pi_123_secret_x"));
        assert_eq!(handle.amount_minor, Some(5000));
        assert!(!handle.requires_action);
    }

    #[tokio::test]
    async fn declined_card_maps_to_user_safe_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/payment_intents/pi_123/confirm")
            .with_status(402)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"code":"card_error","decline_code":"insufficient_funds"}}"#)
            .create_async()
            .await;

        let adapter = adapter_for(&server.url());
        let err = adapter
            .confirm_intent("pi_123", Some("pm_1"), None, "req-2")
            .await
            .unwrap_err();

        match err {
            GatewayError::Rejected { message, decline_code } => {
                assert_eq!(message, "The card has insufficient funds.");
                assert_eq!(decline_code.as_deref(), Some("insufficient_funds"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limited_response_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/payment_intents")
            .with_status(429)
            .with_body("{}")
            .create_async()
            .await;

        let adapter = adapter_for(&server.url());
        let err = adapter.create_intent(intent_request(5000)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn list_methods_maps_display_fields() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/customers/cus_1/payment_methods")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[{"id":"pm_1","card":{"brand":"visa","last4":"4242","exp_month":12,"exp_year":2030},"is_default":true}]}"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server.url());
        let methods = adapter.list_methods("cus_1").await.unwrap();

        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].brand, "visa");
        assert_eq!(methods[0].last4, "4242");
        assert!(methods[0].is_default);
    }

    fn sign(body: &[u8], secret: &str, timestamp: i64) -> String {
        let mut payload = format!("{timestamp}.").into_bytes();
        payload.extend_from_slice(body);
        let mac = hmac_sha256(secret.as_bytes(), &payload);
        format!("t={timestamp},v1={}", hex::encode(mac))
    }

    fn event_body() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_123",
                "status": "succeeded",
                "amount": 5000,
                "currency": "eur",
                "metadata": { "order_id": "ORD-1" }
            }}
        }))
        .unwrap()
    }

    #[test]
    fn valid_webhook_signature_is_accepted() {
        let adapter = adapter_for("http://unused.example");
        let body = event_body();
        let mut headers = HeaderMap::new();
        headers.insert(
            "Webhook-Signature",
            sign(&body, "whsec_test123", Utc::now().timestamp()).parse().unwrap(),
        );

        let event = adapter.verify_webhook(&headers, &body).unwrap();
        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.transaction_id, "pi_123");
        assert_eq!(event.native_status, "succeeded");
        assert_eq!(event.order_id.as_deref(), Some("ORD-1"));
        assert_eq!(event.amount_minor, Some(5000));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let adapter = adapter_for("http://unused.example");
        let body = event_body();
        let mut headers = HeaderMap::new();
        headers.insert(
            "Webhook-Signature",
            sign(&body, "whsec_test123", Utc::now().timestamp()).parse().unwrap(),
        );

        let mut tampered = body.clone();
        tampered.extend_from_slice(b" ");
        let err = adapter.verify_webhook(&headers, &tampered).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let adapter = adapter_for("http://unused.example");
        let body = event_body();
        let mut headers = HeaderMap::new();
        headers.insert(
            "Webhook-Signature",
            sign(&body, "whsec_test123", Utc::now().timestamp() - 600).parse().unwrap(),
        );

        let err = adapter.verify_webhook(&headers, &body).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn malformed_signature_header_is_rejected() {
        let adapter = adapter_for("http://unused.example");
        let body = event_body();
        let mut headers = HeaderMap::new();
        headers.insert("Webhook-Signature", "garbage".parse().unwrap());

        let err = adapter.verify_webhook(&headers, &body).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn dispute_event_collapses_to_dispute_marker() {
        let adapter = adapter_for("http://unused.example");
        let body = serde_json::to_vec(&serde_json::json!({
            "id": "evt_2",
            "type": "charge.dispute.created",
            "data": { "object": {
                "id": "pi_123",
                "status": "needs_response",
                "metadata": { "order_id": "ORD-1" }
            }}
        }))
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "Webhook-Signature",
            sign(&body, "whsec_test123", Utc::now().timestamp()).parse().unwrap(),
        );

        let event = adapter.verify_webhook(&headers, &body).unwrap();
        assert_eq!(event.native_status, "dispute_created");
    }
}

//! Webhook intake.
//!
//! Raw headers and body go to the gateway adapter for signature
//! verification; only verified events reach the ledger. The route shares
//! the completion path with the synchronous confirm call, so a payment
//! reported first by webhook behaves identically to one confirmed by the
//! buyer's browser.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::domain::Gateway;
use crate::error::PaymentError;
use crate::AppState;

pub async fn receive(
    State(state): State<AppState>,
    Path(gateway_slug): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let include_detail = !state.config.is_production();

    let gateway: Gateway = match gateway_slug.parse() {
        Ok(gateway) => gateway,
        Err(_) => {
            return PaymentError::WebhookVerification(format!(
                "unknown payment gateway: {gateway_slug}"
            ))
            .into_envelope(include_detail)
        }
    };

    match state.orchestrator.process_webhook(gateway, &headers, &body).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "received": true,
                "event_id": outcome.event_id,
                "duplicate": outcome.duplicate,
            })),
        )
            .into_response(),
        Err(err @ PaymentError::OrderNotFound(_)) => {
            // Money moved for an order we cannot find. Alert loudly; the
            // gateway will redeliver.
            error!(gateway = %gateway, error = %err, "webhook references a missing order");
            err.into_envelope(include_detail)
        }
        Err(err) => err.into_envelope(include_detail),
    }
}

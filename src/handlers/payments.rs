//! Payment operation handlers.
//!
//! The gateway arrives as a string slug here, at the outermost boundary;
//! everything behind these handlers works with the closed [`Gateway`] enum.
//! An unknown slug is answered with the operation's failure code without
//! touching any order.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::domain::{Customer, Gateway};
use crate::error::{ErrorCode, PaymentError};
use crate::services::{ConfirmTransactionRequest, CreateTransactionRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentBody {
    pub gateway: String,
    pub amount_minor: i64,
    pub currency: String,
    pub order_id: String,
    pub customer: Customer,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentBody {
    pub gateway: String,
    pub transaction_id: String,
    pub order_id: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub save_method: bool,
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub gateway: String,
}

fn unknown_gateway(code: ErrorCode, slug: &str) -> PaymentError {
    PaymentError::Gateway {
        code,
        message: format!("unknown payment gateway: {slug}"),
        decline_code: None,
        retryable: false,
    }
}

pub async fn create_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentBody>,
) -> Response {
    let include_detail = !state.config.is_production();

    let gateway: Gateway = match body.gateway.parse() {
        Ok(gateway) => gateway,
        Err(_) => {
            return unknown_gateway(ErrorCode::PaymentCreationFailed, &body.gateway)
                .into_envelope(include_detail)
        }
    };

    let result = state
        .orchestrator
        .create_transaction(CreateTransactionRequest {
            gateway,
            amount_minor: body.amount_minor,
            currency: body.currency,
            order_id: body.order_id,
            customer: body.customer,
            description: body.description,
            metadata: body.metadata,
        })
        .await;

    match result {
        Ok(transaction) => (
            StatusCode::OK,
            Json(json!({ "success": true, "transaction": transaction })),
        )
            .into_response(),
        Err(err) => err.into_envelope(include_detail),
    }
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(body): Json<ConfirmPaymentBody>,
) -> Response {
    let include_detail = !state.config.is_production();

    let gateway: Gateway = match body.gateway.parse() {
        Ok(gateway) => gateway,
        Err(_) => {
            return unknown_gateway(ErrorCode::PaymentConfirmationFailed, &body.gateway)
                .into_envelope(include_detail)
        }
    };

    let result = state
        .orchestrator
        .confirm_transaction(ConfirmTransactionRequest {
            gateway,
            transaction_id: body.transaction_id,
            order_id: body.order_id,
            method_ref: body.payment_method,
            save_method: body.save_method,
            return_url: body.return_url,
        })
        .await;

    match result {
        Ok(confirmed) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "transaction": confirmed.transaction,
                "order_status": confirmed.order_status,
            })),
        )
            .into_response(),
        Err(err) => err.into_envelope(include_detail),
    }
}

pub async fn list_payment_methods(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Query(query): Query<GatewayQuery>,
) -> Response {
    let include_detail = !state.config.is_production();

    let gateway: Gateway = match query.gateway.parse() {
        Ok(gateway) => gateway,
        Err(_) => {
            return unknown_gateway(ErrorCode::PaymentMethodFailed, &query.gateway)
                .into_envelope(include_detail)
        }
    };

    match state
        .orchestrator
        .saved_payment_methods(&customer_id, gateway)
        .await
    {
        Ok(methods) => (
            StatusCode::OK,
            Json(json!({ "success": true, "payment_methods": methods })),
        )
            .into_response(),
        Err(err) => err.into_envelope(include_detail),
    }
}

pub async fn delete_payment_method(
    State(state): State<AppState>,
    Path((customer_id, method_id)): Path<(String, String)>,
    Query(query): Query<GatewayQuery>,
) -> Response {
    let include_detail = !state.config.is_production();

    let gateway: Gateway = match query.gateway.parse() {
        Ok(gateway) => gateway,
        Err(_) => {
            return unknown_gateway(ErrorCode::PaymentMethodFailed, &query.gateway)
                .into_envelope(include_detail)
        }
    };

    match state
        .orchestrator
        .delete_payment_method(&customer_id, &method_id, gateway)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(err) => err.into_envelope(include_detail),
    }
}

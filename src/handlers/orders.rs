//! Order record handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::domain::OrderDraft;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddNoteBody {
    pub content: String,
    pub author: String,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Response {
    let include_detail = !state.config.is_production();

    match state.orchestrator.ledger().create_order(draft).await {
        Ok(order) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "order": order })),
        )
            .into_response(),
        Err(err) => err.into_envelope(include_detail),
    }
}

pub async fn get_order(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let include_detail = !state.config.is_production();

    match state.orchestrator.ledger().get_order(&id).await {
        Ok(Some(order)) => {
            (StatusCode::OK, Json(json!({ "success": true, "order": order }))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": { "code": "ORDER_NOT_FOUND", "message": format!("Order not found: {id}") },
            })),
        )
            .into_response(),
        Err(err) => err.into_envelope(include_detail),
    }
}

pub async fn add_order_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddNoteBody>,
) -> Response {
    let include_detail = !state.config.is_production();

    match state
        .orchestrator
        .ledger()
        .add_order_note(&id, &body.content, &body.author)
        .await
    {
        Ok(order) => {
            (StatusCode::OK, Json(json!({ "success": true, "order": order }))).into_response()
        }
        Err(err) => err.into_envelope(include_detail),
    }
}

pub async fn customer_orders(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Response {
    let include_detail = !state.config.is_production();

    match state.orchestrator.ledger().customer_orders(&customer_id).await {
        Ok(orders) => {
            (StatusCode::OK, Json(json!({ "success": true, "orders": orders }))).into_response()
        }
        Err(err) => err.into_envelope(include_detail),
    }
}

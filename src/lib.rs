pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateways;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod status;
pub mod utils;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::config::Config;
use crate::services::TransactionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransactionOrchestrator>,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments", post(handlers::payments::create_payment))
        .route("/payments/confirm", post(handlers::payments::confirm_payment))
        .route(
            "/customers/:customer_id/payment-methods",
            get(handlers::payments::list_payment_methods),
        )
        .route(
            "/customers/:customer_id/payment-methods/:method_id",
            delete(handlers::payments::delete_payment_method),
        )
        .route("/customers/:customer_id/orders", get(handlers::orders::customer_orders))
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/notes", post(handlers::orders::add_order_note))
        .route("/webhooks/:gateway", post(handlers::webhook::receive))
        .layer(axum::middleware::from_fn(
            middleware::request_logger_middleware,
        ))
        .with_state(state)
}

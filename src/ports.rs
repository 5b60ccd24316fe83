//! Ports: the traits this core depends on, implemented by adapters.
//!
//! The order store is keyed by order id and versioned: every successful
//! write bumps the version, and `compare_and_swap` refuses a write whose
//! expected version is stale. That is the single-writer guard the confirm
//! and webhook paths rely on when they race on the same order.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Order;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(String),

    #[error("version conflict on order {0}")]
    Conflict(String),

    #[error("order {0} already exists")]
    AlreadyExists(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed order store with optimistic concurrency.
///
/// Durability is the implementation's concern; the core only assumes
/// read-your-writes consistency.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Returns the order and its current version.
    async fn get(&self, id: &str) -> StoreResult<Option<(u64, Order)>>;

    async fn insert(&self, order: Order) -> StoreResult<Order>;

    /// Writes `order` only if its stored version still equals
    /// `expected_version`. Returns `Conflict` otherwise.
    async fn compare_and_swap(&self, expected_version: u64, order: Order) -> StoreResult<Order>;

    async fn list_by_customer(&self, customer_id: &str) -> StoreResult<Vec<Order>>;
}

/// Sends the payment confirmation message to the customer.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_payment_confirmation(&self, order: &Order) -> anyhow::Result<()>;
}

/// Applies stock adjustments for sold line items.
#[async_trait]
pub trait InventorySink: Send + Sync {
    async fn adjust(&self, sku: &str, delta: i64) -> anyhow::Result<()>;
}

//! In-memory implementation of the order store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::Order;
use crate::ports::{OrderStore, StoreError, StoreResult};

/// Keyed map with per-record versions. The version bump inside the write
/// lock is what makes `compare_and_swap` atomic.
#[derive(Default)]
pub struct InMemoryOrderStore {
    records: RwLock<HashMap<String, (u64, Order)>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: &str) -> StoreResult<Option<(u64, Order)>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn insert(&self, order: Order) -> StoreResult<Order> {
        let mut records = self.records.write().await;
        if records.contains_key(&order.id) {
            return Err(StoreError::AlreadyExists(order.id));
        }
        records.insert(order.id.clone(), (1, order.clone()));
        Ok(order)
    }

    async fn compare_and_swap(&self, expected_version: u64, order: Order) -> StoreResult<Order> {
        let mut records = self.records.write().await;
        match records.get(&order.id) {
            None => Err(StoreError::NotFound(order.id)),
            Some((version, _)) if *version != expected_version => {
                Err(StoreError::Conflict(order.id))
            }
            Some(_) => {
                records.insert(order.id.clone(), (expected_version + 1, order.clone()));
                Ok(order)
            }
        }
    }

    async fn list_by_customer(&self, customer_id: &str) -> StoreResult<Vec<Order>> {
        let records = self.records.read().await;
        let mut orders: Vec<Order> = records
            .values()
            .filter(|(_, order)| order.customer.id == customer_id)
            .map(|(_, order)| order.clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

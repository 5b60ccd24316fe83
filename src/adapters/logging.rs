//! Log-only collaborators for environments without a mail or stock backend.

use async_trait::async_trait;

use crate::domain::Order;
use crate::ports::{InventorySink, Notifier};

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_payment_confirmation(&self, order: &Order) -> anyhow::Result<()> {
        tracing::info!(
            order_id = %order.id,
            customer = %order.customer.id,
            "payment confirmation queued"
        );
        Ok(())
    }
}

pub struct LogInventorySink;

#[async_trait]
impl InventorySink for LogInventorySink {
    async fn adjust(&self, sku: &str, delta: i64) -> anyhow::Result<()> {
        tracing::info!(sku = %sku, delta, "inventory adjustment queued");
        Ok(())
    }
}

//! Post-payment workflow.
//!
//! Runs once per order transition into `Paid`: confirmation notification,
//! invoice generation, inventory adjustment. The payment is real whether or
//! not these succeed, so every step is caught and logged with enough
//! context for manual remediation and none of them ever touches the
//! order's paid status.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::domain::{Invoice, InvoiceLine, Order};
use crate::ports::{InventorySink, Notifier};

use super::ledger::OrderLedger;

#[derive(Clone)]
pub struct PostPaymentWorkflow {
    ledger: OrderLedger,
    notifier: Arc<dyn Notifier>,
    inventory: Arc<dyn InventorySink>,
}

impl PostPaymentWorkflow {
    pub fn new(
        ledger: OrderLedger,
        notifier: Arc<dyn Notifier>,
        inventory: Arc<dyn InventorySink>,
    ) -> Self {
        Self {
            ledger,
            notifier,
            inventory,
        }
    }

    pub async fn run(&self, order_id: &str) {
        let order = match self.ledger.get_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                error!(order_id, "post-payment workflow: order disappeared before side effects ran");
                return;
            }
            Err(e) => {
                error!(order_id, error = %e, "post-payment workflow: order lookup failed");
                return;
            }
        };

        self.send_confirmation(&order).await;
        self.generate_invoice(&order).await;
        self.adjust_inventory(&order).await;

        info!(order_id, "post-payment workflow finished");
    }

    async fn send_confirmation(&self, order: &Order) {
        if let Err(e) = self.notifier.send_payment_confirmation(order).await {
            error!(order_id = %order.id, error = %e, "confirmation notification failed");
            self.remediation_note(&order.id, &format!("confirmation notification failed: {e}"))
                .await;
        }
    }

    async fn generate_invoice(&self, order: &Order) {
        if order.invoice.is_some() {
            info!(order_id = %order.id, "invoice already exists; skipping generation");
            return;
        }

        let invoice = build_invoice(order);
        match self.ledger.attach_invoice(&order.id, invoice).await {
            Ok(order) => {
                if let Some(invoice) = &order.invoice {
                    info!(order_id = %order.id, invoice = %invoice.number, "invoice on record");
                }
            }
            Err(e) => {
                error!(order_id = %order.id, error = %e, "invoice generation failed");
                self.remediation_note(&order.id, &format!("invoice generation failed: {e}"))
                    .await;
            }
        }
    }

    async fn adjust_inventory(&self, order: &Order) {
        for item in &order.items {
            if let Err(e) = self.inventory.adjust(&item.sku, -i64::from(item.quantity)).await {
                error!(
                    order_id = %order.id,
                    sku = %item.sku,
                    quantity = item.quantity,
                    error = %e,
                    "inventory adjustment failed"
                );
                self.remediation_note(
                    &order.id,
                    &format!("inventory adjustment failed for {}: {e}", item.sku),
                )
                .await;
            }
        }
    }

    async fn remediation_note(&self, order_id: &str, content: &str) {
        if let Err(e) = self.ledger.add_order_note(order_id, content, "system").await {
            error!(order_id, error = %e, "could not record remediation note");
        }
    }
}

/// Item/amount snapshot at generation time; the invoice never changes after
/// this.
fn build_invoice(order: &Order) -> Invoice {
    let currency = order
        .payment
        .as_ref()
        .map(|snapshot| snapshot.currency.clone())
        .unwrap_or_default();

    Invoice {
        number: format!("INV-{}", order.id),
        order_id: order.id.clone(),
        lines: order
            .items
            .iter()
            .map(|item| InvoiceLine {
                sku: item.sku.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                amount_minor: item.total_minor(),
            })
            .collect(),
        total_minor: order.total_minor(),
        currency,
        issued_at: Utc::now(),
    }
}

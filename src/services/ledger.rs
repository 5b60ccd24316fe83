//! Order ledger.
//!
//! Sole owner of order records. Payment updates arrive from two racing
//! entry points (the buyer's confirm call and the gateway's webhook) and
//! are applied as a last-write-wins merge keyed by transaction id, guarded
//! by the store's compare-and-swap so a read-modify-write can never clobber
//! a concurrent winner.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{
    Gateway, Order, OrderDraft, OrderNote, PaymentSnapshot, TransactionStatus,
};
use crate::error::PaymentError;
use crate::ports::{OrderStore, StoreError};
use crate::status::derive_order_status;

const MAX_CAS_RETRIES: u32 = 5;

/// Fields merged into the order's embedded payment snapshot. Absent fields
/// keep their previous value when the update targets the same transaction.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub transaction_id: String,
    pub gateway: Gateway,
    pub status: TransactionStatus,
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
    pub reference: Option<String>,
}

/// Result of applying a payment update.
#[derive(Debug, Clone)]
pub struct PaymentApplied {
    pub order: Order,
    /// True exactly when this update moved the order into `Paid`. The
    /// caller uses it to fire the post-payment workflow once.
    pub newly_completed: bool,
}

#[derive(Clone)]
pub struct OrderLedger {
    store: Arc<dyn OrderStore>,
}

impl OrderLedger {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, PaymentError> {
        let order = Order::from_draft(draft);
        let order = self
            .store
            .insert(order)
            .await
            .map_err(|e| PaymentError::Internal(e.to_string()))?;
        info!(order_id = %order.id, correlation = %order.payment_correlation_id, "order created");
        Ok(order)
    }

    pub async fn get_order(&self, id: &str) -> Result<Option<Order>, PaymentError> {
        let record = self
            .store
            .get(id)
            .await
            .map_err(|e| PaymentError::Internal(e.to_string()))?;
        Ok(record.map(|(_, order)| order))
    }

    /// Merges payment fields into the order and recomputes its status from
    /// the derivation table.
    ///
    /// Stale updates (a transition the status ordering does not accept) are
    /// applied as no-ops. A missing order is fatal: it means the order
    /// record was lost upstream, and the payment flow must abort loudly.
    pub async fn update_order_payment(
        &self,
        order_id: &str,
        update: PaymentUpdate,
    ) -> Result<PaymentApplied, PaymentError> {
        for _ in 0..MAX_CAS_RETRIES {
            let (version, mut order) = self
                .store
                .get(order_id)
                .await
                .map_err(|e| PaymentError::Internal(e.to_string()))?
                .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;

            if let Some(snapshot) = &order.payment {
                if !snapshot.status.accepts_transition(update.status) {
                    info!(
                        order_id,
                        transaction_id = %update.transaction_id,
                        current = %snapshot.status,
                        incoming = %update.status,
                        "stale payment update ignored"
                    );
                    return Ok(PaymentApplied {
                        order,
                        newly_completed: false,
                    });
                }
            }

            let previously_paid = order
                .payment
                .as_ref()
                .map(|snapshot| snapshot.status == TransactionStatus::Completed)
                .unwrap_or(false);

            // Merge: keep previous values for fields the update omits when
            // it targets the same transaction; a new transaction id
            // supersedes the snapshot wholesale.
            let base = order
                .payment
                .as_ref()
                .filter(|snapshot| snapshot.transaction_id == update.transaction_id);
            let snapshot = PaymentSnapshot {
                transaction_id: update.transaction_id.clone(),
                gateway: update.gateway,
                status: update.status,
                amount_minor: update
                    .amount_minor
                    .or(base.map(|s| s.amount_minor))
                    .unwrap_or(0),
                currency: update
                    .currency
                    .clone()
                    .or_else(|| base.map(|s| s.currency.clone()))
                    .unwrap_or_default(),
                reference: update
                    .reference
                    .clone()
                    .or_else(|| base.and_then(|s| s.reference.clone())),
                updated_at: Utc::now(),
            };
            order.payment = Some(snapshot);

            match derive_order_status(update.status) {
                Some(status) => order.status = status,
                // Disputes never move the order automatically; they are
                // flagged for manual review instead.
                None => order.notes.push(OrderNote::system(format!(
                    "payment {} disputed; flagged for manual review",
                    update.transaction_id
                ))),
            }
            order.updated_at = Utc::now();

            let newly_completed =
                update.status == TransactionStatus::Completed && !previously_paid;

            match self.store.compare_and_swap(version, order).await {
                Ok(order) => {
                    info!(
                        order_id,
                        transaction_id = %update.transaction_id,
                        status = %update.status,
                        order_status = order.status.as_str(),
                        newly_completed,
                        "payment update applied"
                    );
                    return Ok(PaymentApplied {
                        order,
                        newly_completed,
                    });
                }
                Err(StoreError::Conflict(_)) => {
                    warn!(order_id, "payment update lost a write race; retrying");
                    continue;
                }
                Err(StoreError::NotFound(id)) => return Err(PaymentError::OrderNotFound(id)),
                Err(e) => return Err(PaymentError::Internal(e.to_string())),
            }
        }

        Err(PaymentError::Internal(format!(
            "order {order_id} update exceeded {MAX_CAS_RETRIES} compare-and-swap attempts"
        )))
    }

    /// Append-only; existing notes are never rewritten.
    pub async fn add_order_note(
        &self,
        order_id: &str,
        content: &str,
        author: &str,
    ) -> Result<Order, PaymentError> {
        for _ in 0..MAX_CAS_RETRIES {
            let (version, mut order) = self
                .store
                .get(order_id)
                .await
                .map_err(|e| PaymentError::Internal(e.to_string()))?
                .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;

            order.notes.push(OrderNote::new(content, author));
            order.updated_at = Utc::now();

            match self.store.compare_and_swap(version, order).await {
                Ok(order) => return Ok(order),
                Err(StoreError::Conflict(_)) => continue,
                Err(StoreError::NotFound(id)) => return Err(PaymentError::OrderNotFound(id)),
                Err(e) => return Err(PaymentError::Internal(e.to_string())),
            }
        }

        Err(PaymentError::Internal(format!(
            "order {order_id} note append exceeded {MAX_CAS_RETRIES} compare-and-swap attempts"
        )))
    }

    /// Attaches an invoice unless one already exists; the existing invoice
    /// wins and the call reports which one ended up on the order.
    pub async fn attach_invoice(
        &self,
        order_id: &str,
        invoice: crate::domain::Invoice,
    ) -> Result<Order, PaymentError> {
        for _ in 0..MAX_CAS_RETRIES {
            let (version, mut order) = self
                .store
                .get(order_id)
                .await
                .map_err(|e| PaymentError::Internal(e.to_string()))?
                .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))?;

            if order.invoice.is_some() {
                return Ok(order);
            }

            order.invoice = Some(invoice.clone());
            order.updated_at = Utc::now();

            match self.store.compare_and_swap(version, order).await {
                Ok(order) => return Ok(order),
                Err(StoreError::Conflict(_)) => continue,
                Err(StoreError::NotFound(id)) => return Err(PaymentError::OrderNotFound(id)),
                Err(e) => return Err(PaymentError::Internal(e.to_string())),
            }
        }

        Err(PaymentError::Internal(format!(
            "order {order_id} invoice attach exceeded {MAX_CAS_RETRIES} compare-and-swap attempts"
        )))
    }

    /// Orders for one customer, newest first.
    pub async fn customer_orders(&self, customer_id: &str) -> Result<Vec<Order>, PaymentError> {
        self.store
            .list_by_customer(customer_id)
            .await
            .map_err(|e| PaymentError::Internal(e.to_string()))
    }
}

//! Order domain entities.
//!
//! An order is the business-facing record a payment settles against. Its
//! `status` is always derived from the embedded payment snapshot; callers
//! never set it directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::{Gateway, TransactionStatus};

/// Business-facing order status, derived from the payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    AwaitingPayment,
    Processing,
    Paid,
    PaymentFailed,
    Refunded,
    PartiallyRefunded,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::Processing => "processing",
            OrderStatus::Paid => "paid",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Refunded => "refunded",
            OrderStatus::PartiallyRefunded => "partially_refunded",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub unit_amount_minor: i64,
}

impl LineItem {
    pub fn total_minor(&self) -> i64 {
        self.unit_amount_minor * i64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub name: String,
    /// ISO 3166-1 alpha-2, used for the strong-authentication decision.
    pub billing_country: String,
    /// The card processor's customer handle, if one has been created.
    /// Saved-method operations are unavailable without it.
    pub gateway_customer_id: Option<String>,
}

/// Last-known state of the transaction paying for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub transaction_id: String,
    pub gateway: Gateway,
    pub status: TransactionStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub reference: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    pub amount_minor: i64,
}

/// Immutable once created; at most one per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub number: String,
    pub order_id: String,
    pub lines: Vec<InvoiceLine>,
    pub total_minor: i64,
    pub currency: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderNote {
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl OrderNote {
    pub fn new(content: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            author: author.into(),
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(content, "system")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub items: Vec<LineItem>,
    pub customer: Customer,
    pub payment: Option<PaymentSnapshot>,
    pub invoice: Option<Invoice>,
    /// Append-only; existing notes are never mutated.
    pub notes: Vec<OrderNote>,
    /// Correlates every payment attempt for this order in the logs.
    pub payment_correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an order. An id is assigned if absent.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    pub id: Option<String>,
    pub items: Vec<LineItem>,
    pub customer: Customer,
}

impl Order {
    pub fn from_draft(draft: OrderDraft) -> Self {
        let now = Utc::now();
        Self {
            id: draft.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            status: OrderStatus::AwaitingPayment,
            items: draft.items,
            customer: draft.customer,
            payment: None,
            invoice: None,
            notes: Vec::new(),
            payment_correlation_id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_minor(&self) -> i64 {
        self.items.iter().map(LineItem::total_minor).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Customer {
        Customer {
            id: "cus-1".into(),
            email: "jo@example.com".into(),
            name: "Jo Example".into(),
            billing_country: "DE".into(),
            gateway_customer_id: None,
        }
    }

    #[test]
    fn draft_without_id_gets_one_assigned() {
        let order = Order::from_draft(OrderDraft {
            id: None,
            items: vec![],
            customer: customer(),
        });
        assert!(!order.id.is_empty());
        assert_eq!(order.status, OrderStatus::AwaitingPayment);
        assert!(order.payment.is_none());
        assert!(!order.payment_correlation_id.is_empty());
    }

    #[test]
    fn order_total_sums_line_items() {
        let order = Order::from_draft(OrderDraft {
            id: Some("ORD-1".into()),
            items: vec![
                LineItem {
                    sku: "sku-a".into(),
                    name: "A".into(),
                    quantity: 2,
                    unit_amount_minor: 1500,
                },
                LineItem {
                    sku: "sku-b".into(),
                    name: "B".into(),
                    quantity: 1,
                    unit_amount_minor: 2000,
                },
            ],
            customer: customer(),
        });
        assert_eq!(order.total_minor(), 5000);
    }
}

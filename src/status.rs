//! Status normalization.
//!
//! Each gateway speaks its own status vocabulary; everything downstream of
//! the adapters works in [`TransactionStatus`]. Both mapping tables here are
//! fixed: an unmapped native status normalizes to `Pending`, which keeps an
//! unknown gateway state from ever being treated as money received.

use crate::domain::{Gateway, OrderStatus, TransactionStatus};

/// Maps a gateway-native status string to the standard status.
pub fn normalize(gateway: Gateway, native: &str) -> TransactionStatus {
    match gateway {
        Gateway::Cardstream => normalize_cardstream(native),
        Gateway::Walletpay => normalize_walletpay(native),
        Gateway::BankTransfer => normalize_bank_transfer(native),
    }
}

fn normalize_cardstream(native: &str) -> TransactionStatus {
    match native {
        "requires_payment_method" | "requires_confirmation" | "requires_action" => {
            TransactionStatus::Pending
        }
        "processing" | "requires_capture" => TransactionStatus::Processing,
        "succeeded" => TransactionStatus::Completed,
        "payment_failed" => TransactionStatus::Failed,
        "canceled" => TransactionStatus::Cancelled,
        "refunded" => TransactionStatus::Refunded,
        "partially_refunded" => TransactionStatus::PartiallyRefunded,
        "dispute_created" => TransactionStatus::Disputed,
        _ => TransactionStatus::Pending,
    }
}

fn normalize_walletpay(native: &str) -> TransactionStatus {
    match native {
        "CREATED" | "SAVED" | "PAYER_ACTION_REQUIRED" => TransactionStatus::Pending,
        "APPROVED" => TransactionStatus::Processing,
        "COMPLETED" => TransactionStatus::Completed,
        "DECLINED" => TransactionStatus::Failed,
        "VOIDED" => TransactionStatus::Cancelled,
        "REFUNDED" => TransactionStatus::Refunded,
        "PARTIALLY_REFUNDED" => TransactionStatus::PartiallyRefunded,
        _ => TransactionStatus::Pending,
    }
}

fn normalize_bank_transfer(native: &str) -> TransactionStatus {
    match native {
        "pending" => TransactionStatus::Pending,
        "received" | "settled" => TransactionStatus::Completed,
        "returned" => TransactionStatus::Failed,
        "cancelled" => TransactionStatus::Cancelled,
        "refunded" => TransactionStatus::Refunded,
        _ => TransactionStatus::Pending,
    }
}

/// The fixed order-status derivation table.
///
/// Returns `None` for `Disputed`: a dispute flags the order for manual
/// review but never changes its status automatically.
pub fn derive_order_status(status: TransactionStatus) -> Option<OrderStatus> {
    match status {
        TransactionStatus::Pending => Some(OrderStatus::AwaitingPayment),
        TransactionStatus::Processing => Some(OrderStatus::Processing),
        TransactionStatus::Completed => Some(OrderStatus::Paid),
        TransactionStatus::Failed => Some(OrderStatus::PaymentFailed),
        TransactionStatus::Refunded => Some(OrderStatus::Refunded),
        TransactionStatus::PartiallyRefunded => Some(OrderStatus::PartiallyRefunded),
        TransactionStatus::Cancelled => Some(OrderStatus::Cancelled),
        TransactionStatus::Disputed => None,
    }
}

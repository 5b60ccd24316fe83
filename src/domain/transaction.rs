//! Transaction domain entities.
//! Gateway-agnostic representation of a payment transaction and its status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported payment gateways. A closed set: dispatch to an adapter is a
/// `match` on this enum, so adding or removing a gateway is a compile-time
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    Cardstream,
    Walletpay,
    BankTransfer,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gateway::Cardstream => "cardstream",
            Gateway::Walletpay => "walletpay",
            Gateway::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGateway(pub String);

impl fmt::Display for UnknownGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown payment gateway: {}", self.0)
    }
}

impl std::error::Error for UnknownGateway {}

impl FromStr for Gateway {
    type Err = UnknownGateway;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cardstream" => Ok(Gateway::Cardstream),
            "walletpay" => Ok(Gateway::Walletpay),
            "bank_transfer" => Ok(Gateway::BankTransfer),
            other => Err(UnknownGateway(other.to_string())),
        }
    }
}

/// Standard transaction status, common to all gateways.
///
/// Confidence ordering: `Pending < Processing < Completed`. `Failed` and
/// `Cancelled` branch off before completion and can be superseded by a
/// retry. `Refunded`, `PartiallyRefunded` and `Disputed` are only reachable
/// after `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
    Disputed,
}

impl TransactionStatus {
    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// Updates that are not accepted are stale or out-of-order deliveries
    /// and are applied as no-ops, never as errors: the confirm path and a
    /// webhook for the same transaction can race, and the lower-confidence
    /// result may arrive last.
    pub fn accepts_transition(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        match self {
            Pending => matches!(next, Processing | Completed | Failed | Cancelled),
            Processing => matches!(next, Completed | Failed | Cancelled),
            // A completed payment never regresses; it can only move into
            // the refund/dispute family.
            Completed => matches!(next, Refunded | PartiallyRefunded | Disputed),
            // A failed or cancelled attempt can be superseded by a retry.
            Failed | Cancelled => matches!(next, Pending | Processing | Completed),
            Refunded => matches!(next, Disputed),
            PartiallyRefunded => matches!(next, Refunded | Disputed),
            Disputed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::PartiallyRefunded => "partially_refunded",
            TransactionStatus::Disputed => "disputed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The gateway-facing unit of work, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Gateway-assigned id (intent id, wallet order id, or bank reference).
    pub id: String,
    pub gateway: Gateway,
    /// Amount in minor units. Never floating point.
    pub amount_minor: i64,
    /// ISO 4217 code.
    pub currency: String,
    pub status: TransactionStatus,
    pub requires_action: bool,
    /// Opaque handshake token: a client secret for the card processor, an
    /// approval URL for the wallet, remittance details for bank transfer.
    pub client_token: Option<String>,
    pub order_id: String,
}

/// A saved payment instrument. Display-only data; the PAN never enters this
/// system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
    #[serde(default)]
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_slugs_round_trip() {
        for gateway in [Gateway::Cardstream, Gateway::Walletpay, Gateway::BankTransfer] {
            assert_eq!(gateway.as_str().parse::<Gateway>().unwrap(), gateway);
        }
    }

    #[test]
    fn unknown_gateway_slug_is_rejected() {
        let err = "carrier-pigeon".parse::<Gateway>().unwrap_err();
        assert_eq!(err.0, "carrier-pigeon");
    }

    #[test]
    fn completed_never_regresses() {
        use TransactionStatus::*;
        for lower in [Pending, Processing, Failed, Cancelled] {
            assert!(!Completed.accepts_transition(lower));
        }
        assert!(Completed.accepts_transition(Refunded));
        assert!(Completed.accepts_transition(PartiallyRefunded));
        assert!(Completed.accepts_transition(Disputed));
    }

    #[test]
    fn refund_family_requires_completed() {
        use TransactionStatus::*;
        for from in [Pending, Processing, Failed, Cancelled] {
            assert!(!from.accepts_transition(Refunded));
            assert!(!from.accepts_transition(Disputed));
        }
    }

    #[test]
    fn failed_attempt_can_be_retried() {
        use TransactionStatus::*;
        assert!(Failed.accepts_transition(Pending));
        assert!(Cancelled.accepts_transition(Completed));
    }

    #[test]
    fn same_status_is_not_a_transition() {
        use TransactionStatus::*;
        let all = [
            Pending,
            Processing,
            Completed,
            Failed,
            Cancelled,
            Refunded,
            PartiallyRefunded,
            Disputed,
        ];
        for status in all {
            assert!(!status.accepts_transition(status));
        }
    }
}

pub mod events;
pub mod ledger;
pub mod orchestrator;
pub mod workflow;

pub use events::ProcessedEventCache;
pub use ledger::{OrderLedger, PaymentApplied, PaymentUpdate};
pub use orchestrator::{
    ConfirmResult, ConfirmTransactionRequest, CreateTransactionRequest, TransactionOrchestrator,
    WebhookOutcome,
};
pub use workflow::PostPaymentWorkflow;

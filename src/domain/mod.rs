pub mod order;
pub mod transaction;

pub use order::{Customer, Invoice, InvoiceLine, LineItem, Order, OrderDraft, OrderNote, OrderStatus, PaymentSnapshot};
pub use transaction::{Gateway, PaymentMethod, Transaction, TransactionStatus};

pub mod logging;
pub mod memory;

pub use logging::{LogInventorySink, LogNotifier};
pub use memory::InMemoryOrderStore;

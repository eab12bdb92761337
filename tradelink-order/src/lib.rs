pub mod models;
pub mod repository;
pub mod manager;
pub mod processor;
pub mod complaints;
pub mod gateway;
pub mod hooks;
pub mod memory;

#[cfg(test)]
mod testing;

pub use models::{Complaint, Order, OrderDetails, OrderPaymentStatus, OrderStatus, Payment, PaymentStatus};
pub use manager::{OrderManager, OrderPolicy, PricePolicy};
pub use processor::PaymentProcessor;
pub use complaints::ComplaintManager;
pub use gateway::SimulatedGateway;
pub use hooks::{InventoryHook, NoopInventoryHook};
pub use memory::{InMemoryStore, StaticCatalog};

pub mod models;
pub mod pii;

pub use models::events::{EventPayload, MarketEvent};
pub use pii::Masked;

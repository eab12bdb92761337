use async_trait::async_trait;
use tradelink_core::CoreResult;

use crate::models::Order;

/// Called by the order manager when an order enters a state the inventory
/// service cares about. Stock is reserved and released there, not here.
#[async_trait]
pub trait InventoryHook: Send + Sync {
    async fn on_order_confirmed(&self, order: &Order) -> CoreResult<()>;

    async fn on_order_cancelled(&self, order: &Order) -> CoreResult<()>;
}

pub struct NoopInventoryHook;

#[async_trait]
impl InventoryHook for NoopInventoryHook {
    async fn on_order_confirmed(&self, order: &Order) -> CoreResult<()> {
        tracing::debug!("No inventory hook configured; order {} confirmed", order.order_number);
        Ok(())
    }

    async fn on_order_cancelled(&self, order: &Order) -> CoreResult<()> {
        tracing::debug!("No inventory hook configured; order {} cancelled", order.order_number);
        Ok(())
    }
}

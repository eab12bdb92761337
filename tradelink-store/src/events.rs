use tokio::sync::broadcast;
use tracing::{debug, info};
use tradelink_core::EventPublisher;
use tradelink_shared::MarketEvent;

/// In-process fan-out of marketplace events to live subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MarketEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        info!("Event bus ready (capacity {})", capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: MarketEvent) {
        let kind = event.kind();
        let order_id = event.order_id;
        match self.sender.send(event) {
            Ok(receivers) => debug!("Published {} for order {} to {} subscribers", kind, order_id, receivers),
            // No subscribers is normal when nobody is streaming
            Err(_) => debug!("Dropped {} for order {}: no subscribers", kind, order_id),
        }
    }
}

use tradelink_shared::MarketEvent;

/// Sink for marketplace notifications. Publishing is fire-and-forget:
/// a missing subscriber never fails the operation that emitted the event.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: MarketEvent);
}

pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, event: MarketEvent) {
        tracing::trace!("Dropping event {} for order {}", event.kind(), event.order_id);
    }
}

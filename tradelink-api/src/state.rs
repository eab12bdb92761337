use std::sync::Arc;

use tradelink_core::payment::PaymentGateway;
use tradelink_core::CatalogLookup;
use tradelink_order::repository::{ComplaintRepository, OrderRepository, PaymentRepository};
use tradelink_order::{ComplaintManager, OrderManager, OrderPolicy, PaymentProcessor};
use tradelink_store::EventBus;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

/// Storage backends the managers are wired over
pub struct Repositories {
    pub orders: Arc<dyn OrderRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub complaints: Arc<dyn ComplaintRepository>,
    pub catalog: Arc<dyn CatalogLookup>,
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderManager>,
    pub payments: Arc<PaymentProcessor>,
    pub complaints: Arc<ComplaintManager>,
    pub events: EventBus,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        policy: OrderPolicy,
        events: EventBus,
        auth: AuthConfig,
    ) -> Self {
        let publisher = Arc::new(events.clone());

        let orders = OrderManager::new(repos.orders.clone(), repos.payments.clone(), repos.catalog)
            .with_policy(policy)
            .with_events(publisher.clone());
        let payments = PaymentProcessor::new(repos.orders.clone(), repos.payments, gateway)
            .with_events(publisher.clone());
        let complaints = ComplaintManager::new(repos.orders, repos.complaints)
            .with_events(publisher);

        Self {
            orders: Arc::new(orders),
            payments: Arc::new(payments),
            complaints: Arc::new(complaints),
            events,
            auth,
        }
    }
}

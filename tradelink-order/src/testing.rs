//! Shared fixtures for the unit tests of this crate

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tradelink_core::payment::PaymentGateway;
use tradelink_core::{CoreError, CoreResult, EventPublisher, Identity, ProductSnapshot, Role};
use tradelink_shared::{Masked, MarketEvent};
use uuid::Uuid;

use crate::complaints::ComplaintManager;
use crate::hooks::InventoryHook;
use crate::manager::{OrderManager, OrderPolicy};
use crate::memory::{InMemoryStore, StaticCatalog};
use crate::models::{NewOrder, Order, OrderPaymentStatus, Payment, PaymentStatus, ShippingAddress};
use crate::processor::PaymentProcessor;
use crate::repository::PaymentRepository;

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingPublisher {
    pub fn take(&self) -> Vec<MarketEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: MarketEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct RecordingHook {
    confirmed: Mutex<Vec<Uuid>>,
    cancelled: Mutex<Vec<Uuid>>,
}

impl RecordingHook {
    pub fn confirmed(&self) -> Vec<Uuid> {
        self.confirmed.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<Uuid> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryHook for RecordingHook {
    async fn on_order_confirmed(&self, order: &Order) -> CoreResult<()> {
        self.confirmed.lock().unwrap().push(order.id);
        Ok(())
    }

    async fn on_order_cancelled(&self, order: &Order) -> CoreResult<()> {
        self.cancelled.lock().unwrap().push(order.id);
        Ok(())
    }
}

/// How a [`FlakySettlement`] spoils a settlement write
#[derive(Clone, Copy)]
pub enum Spoil {
    /// The storage call fails and nothing is written
    Error,
    /// The write is skipped as if another caller had changed the row
    LoseGuard,
}

/// Payment repository over the fixture store whose next `remaining`
/// settlement writes are spoiled
pub struct FlakySettlement {
    store: Arc<InMemoryStore>,
    spoil: Spoil,
    remaining: AtomicUsize,
}

impl FlakySettlement {
    pub fn new(store: Arc<InMemoryStore>, spoil: Spoil, times: usize) -> Self {
        Self { store, spoil, remaining: AtomicUsize::new(times) }
    }
}

#[async_trait]
impl PaymentRepository for FlakySettlement {
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()> {
        self.store.insert_payment(payment).await
    }

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        self.store.get_payment(id).await
    }

    async fn find_by_order(&self, order_id: Uuid) -> CoreResult<Option<Payment>> {
        self.store.find_by_order(order_id).await
    }

    async fn claim_for_processing(&self, id: Uuid, stale_before: DateTime<Utc>) -> CoreResult<bool> {
        self.store.claim_for_processing(id, stale_before).await
    }

    async fn record_settlement(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
        order_status: Option<OrderPaymentStatus>,
    ) -> CoreResult<bool> {
        let spoiled = self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        match (spoiled, self.spoil) {
            (true, Spoil::Error) => Err(CoreError::internal("connection reset")),
            (true, Spoil::LoseGuard) => Ok(false),
            (false, _) => self.store.record_settlement(payment, expected, order_status).await,
        }
    }
}

pub fn new_order(product_id: Uuid, quantity: i32, unit_price: Decimal) -> NewOrder {
    NewOrder {
        product_id,
        quantity,
        unit_price,
        shipping_address: ShippingAddress {
            recipient: "Receiving Dock 4".to_string(),
            line1: "Europaweg 875".to_string(),
            line2: None,
            city: "Rotterdam".to_string(),
            region: None,
            postal_code: Some("3199 LD".to_string()),
            country: "NL".to_string(),
            phone: Some(Masked("+31 10 252 2222".to_string())),
        },
        payment_method: "bank_transfer".to_string(),
        notes: Some("Deliver on pallets".to_string()),
    }
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub events: Arc<RecordingPublisher>,
    pub inventory: Arc<RecordingHook>,
    pub orders: OrderManager,
    pub product_id: Uuid,
    pub buyer: Identity,
    pub seller: Identity,
    pub admin: Identity,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_policy(OrderPolicy::default()).await
    }

    pub async fn with_policy(policy: OrderPolicy) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let catalog = StaticCatalog::new();
        let events = Arc::new(RecordingPublisher::default());
        let inventory = Arc::new(RecordingHook::default());

        let seller = Identity::new(Uuid::new_v4(), Role::Exporter);
        let product_id = Uuid::new_v4();
        catalog.insert(ProductSnapshot {
            id: product_id,
            seller_id: seller.user_id,
            name: "Cocoa beans, 60kg bag".to_string(),
            price: dec!(10.00),
            available_quantity: 100,
        }).await;

        let orders = OrderManager::new(store.clone(), store.clone(), Arc::new(catalog))
            .with_inventory_hook(inventory.clone())
            .with_events(events.clone())
            .with_policy(policy);

        Self {
            store,
            events,
            inventory,
            orders,
            product_id,
            buyer: Identity::new(Uuid::new_v4(), Role::Importer),
            seller,
            admin: Identity::new(Uuid::new_v4(), Role::Admin),
        }
    }

    /// 3 × 10.00 from the fixture's buyer
    pub async fn place_order(&self) -> Order {
        self.orders
            .create_order(&self.buyer, new_order(self.product_id, 3, dec!(10.00)))
            .await
            .unwrap()
            .order
    }

    pub fn payments(&self, gateway: impl PaymentGateway + 'static) -> PaymentProcessor {
        self.payments_over(self.store.clone(), Arc::new(gateway))
    }

    pub fn payments_over(
        &self,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> PaymentProcessor {
        PaymentProcessor::new(self.store.clone(), payments, gateway)
            .with_events(self.events.clone())
    }

    pub fn complaints(&self) -> ComplaintManager {
        ComplaintManager::new(self.store.clone(), self.store.clone())
            .with_events(self.events.clone())
    }
}

//! In-memory repositories and catalog, used by tests and local development
//! where Postgres is not available. All tables share one lock, so a
//! settlement write is as atomic here as the Postgres transaction is.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tradelink_core::{CatalogLookup, CoreError, CoreResult, ProductSnapshot};
use uuid::Uuid;

use crate::models::{Complaint, ComplaintStatus, Order, OrderPaymentStatus, OrderStatus, Payment, PaymentStatus};
use crate::repository::{ComplaintRepository, OrderRepository, PaymentRepository};

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    payments: HashMap<Uuid, Payment>,
    complaints: HashMap<Uuid, Complaint>,
}

/// Thread-safe in-memory store implementing every repository trait
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(mut rows: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.values().any(|o| o.order_number == order.order_number) {
            return Err(CoreError::conflict(format!(
                "Order number {} already exists",
                order.order_number
            )));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> CoreResult<Vec<Order>> {
        let rows = self.tables.read().await.orders.values().cloned().collect();
        Ok(newest_first(rows, |o: &Order| o.created_at))
    }

    async fn list_orders_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Order>> {
        let rows = self.tables.read().await.orders.values()
            .filter(|o| o.buyer_id == buyer_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |o: &Order| o.created_at))
    }

    async fn list_orders_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Order>> {
        let rows = self.tables.read().await.orders.values()
            .filter(|o| o.seller_id == seller_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |o: &Order| o.created_at))
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_payment_status(&self, id: Uuid, status: OrderPaymentStatus) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&id) {
            Some(order) => {
                order.set_payment_status(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_order(&self, id: Uuid) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.orders.remove(&id).is_none() {
            return Ok(false);
        }
        tables.payments.retain(|_, p| p.order_id != id);
        tables.complaints.retain(|_, c| c.order_id != id);
        Ok(true)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.payments.values().any(|p| p.order_id == payment.order_id) {
            return Err(CoreError::conflict(format!(
                "A payment already exists for order {}",
                payment.order_id
            )));
        }
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn find_by_order(&self, order_id: Uuid) -> CoreResult<Option<Payment>> {
        Ok(self.tables.read().await.payments.values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn claim_for_processing(&self, id: Uuid, stale_before: DateTime<Utc>) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.payments.get_mut(&id) {
            Some(payment)
                if payment.status.is_settleable()
                    || (payment.status == PaymentStatus::Processing && payment.updated_at < stale_before) =>
            {
                payment.apply_status(PaymentStatus::Processing, None);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_settlement(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
        order_status: Option<OrderPaymentStatus>,
    ) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.payments.get(&payment.id) {
            Some(stored) if stored.status == expected => {}
            _ => return Ok(false),
        }

        tables.payments.insert(payment.id, payment.clone());
        if let Some(status) = order_status {
            if let Some(order) = tables.orders.get_mut(&payment.order_id) {
                order.set_payment_status(status);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ComplaintRepository for InMemoryStore {
    async fn insert_complaint(&self, complaint: &Complaint) -> CoreResult<()> {
        self.tables.write().await.complaints.insert(complaint.id, complaint.clone());
        Ok(())
    }

    async fn get_complaint(&self, id: Uuid) -> CoreResult<Option<Complaint>> {
        Ok(self.tables.read().await.complaints.get(&id).cloned())
    }

    async fn list_complaints(&self) -> CoreResult<Vec<Complaint>> {
        let rows = self.tables.read().await.complaints.values().cloned().collect();
        Ok(newest_first(rows, |c: &Complaint| c.created_at))
    }

    async fn list_complaints_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Complaint>> {
        let rows = self.tables.read().await.complaints.values()
            .filter(|c| c.buyer_id == buyer_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |c: &Complaint| c.created_at))
    }

    async fn list_complaints_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Complaint>> {
        let rows = self.tables.read().await.complaints.values()
            .filter(|c| c.seller_id == seller_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |c: &Complaint| c.created_at))
    }

    async fn update_complaint(&self, complaint: &Complaint, expected: ComplaintStatus) -> CoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.complaints.get_mut(&complaint.id) {
            Some(stored) if stored.status == expected => {
                stored.status = complaint.status;
                stored.resolution = complaint.resolution.clone();
                stored.priority = complaint.priority;
                stored.updated_at = complaint.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_complaint(&self, id: Uuid) -> CoreResult<bool> {
        Ok(self.tables.write().await.complaints.remove(&id).is_some())
    }
}

/// Fixed product list standing in for the catalog service
#[derive(Clone, Default)]
pub struct StaticCatalog {
    products: Arc<RwLock<HashMap<Uuid, ProductSnapshot>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product: ProductSnapshot) {
        self.products.write().await.insert(product.id, product);
    }
}

#[async_trait]
impl CatalogLookup for StaticCatalog {
    async fn find_product(&self, product_id: Uuid) -> CoreResult<Option<ProductSnapshot>> {
        Ok(self.products.read().await.get(&product_id).cloned())
    }
}

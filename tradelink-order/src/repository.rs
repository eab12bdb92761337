use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tradelink_core::CoreResult;
use uuid::Uuid;

use crate::models::{Complaint, ComplaintStatus, Order, OrderPaymentStatus, OrderStatus, Payment, PaymentStatus};

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order. A duplicate order number is a `Conflict`.
    async fn insert_order(&self, order: &Order) -> CoreResult<()>;

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>>;

    async fn list_orders(&self) -> CoreResult<Vec<Order>>;

    async fn list_orders_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Order>>;

    async fn list_orders_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Order>>;

    /// Compare-and-set on the status. Returns `false` when the order is
    /// missing or its status is no longer `from`.
    async fn update_order_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> CoreResult<bool>;

    /// Returns `false` when the order does not exist
    async fn update_payment_status(&self, id: Uuid, status: OrderPaymentStatus) -> CoreResult<bool>;

    /// Hard delete; the order's payment and complaints go with it.
    /// Returns `false` when the order does not exist.
    async fn delete_order(&self, id: Uuid) -> CoreResult<bool>;
}

/// Repository trait for payment data access
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new payment. A second payment for the same order is a `Conflict`.
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()>;

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>>;

    async fn find_by_order(&self, order_id: Uuid) -> CoreResult<Option<Payment>>;

    /// Atomically move a settleable payment (pending or failed) to processing.
    /// A processing claim last touched before `stale_before` has expired and
    /// may be taken over. Returns `false` when another caller holds the claim.
    async fn claim_for_processing(&self, id: Uuid, stale_before: DateTime<Utc>) -> CoreResult<bool>;

    /// Write the payment's status fields and its order's payment status as one
    /// unit, provided the stored payment status still equals `expected`.
    /// Returns `false` when the guard did not match.
    async fn record_settlement(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
        order_status: Option<OrderPaymentStatus>,
    ) -> CoreResult<bool>;
}

/// Repository trait for complaint data access
#[async_trait]
pub trait ComplaintRepository: Send + Sync {
    async fn insert_complaint(&self, complaint: &Complaint) -> CoreResult<()>;

    async fn get_complaint(&self, id: Uuid) -> CoreResult<Option<Complaint>>;

    async fn list_complaints(&self) -> CoreResult<Vec<Complaint>>;

    async fn list_complaints_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Complaint>>;

    async fn list_complaints_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Complaint>>;

    /// Persist status, resolution and priority, provided the stored status
    /// still equals `expected`. Returns `false` when missing or changed.
    async fn update_complaint(&self, complaint: &Complaint, expected: ComplaintStatus) -> CoreResult<bool>;

    async fn delete_complaint(&self, id: Uuid) -> CoreResult<bool>;
}

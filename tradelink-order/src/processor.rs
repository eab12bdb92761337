use std::sync::Arc;

use chrono::{Duration, Utc};
use tradelink_core::payment::{ChargeRequest, GatewayOutcome, PaymentGateway};
use tradelink_core::{CoreError, CoreResult, EventPublisher, Identity, NoopPublisher};
use tradelink_shared::{EventPayload, MarketEvent};
use uuid::Uuid;

use crate::manager::authorize_party;
use crate::models::{
    generate_transaction_id, NewPayment, Order, OrderPaymentStatus, OrderStatus, Payment, PaymentStatus,
};
use crate::repository::{OrderRepository, PaymentRepository};

/// Owns payment records and keeps each order's payment status in step with them
pub struct PaymentProcessor {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventPublisher>,
    claim_lease: Duration,
}

impl PaymentProcessor {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders,
            payments,
            gateway,
            events: Arc::new(NoopPublisher),
            claim_lease: Duration::minutes(5),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    /// How long a processing claim blocks other callers before it is
    /// considered abandoned
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    /// Open the (single) payment of an order. Does not touch the order.
    pub async fn create_payment(&self, identity: &Identity, request: NewPayment) -> CoreResult<Payment> {
        let order = self.load_order(request.order_id).await?;
        if !identity.is_self_or_admin(order.buyer_id) {
            return Err(CoreError::forbidden("Only the buyer or an admin can pay for an order"));
        }

        if request.payment_method.trim().is_empty() {
            return Err(CoreError::validation("Payment method is required"));
        }
        if request.amount != order.total_amount {
            return Err(CoreError::validation(format!(
                "Payment amount {} does not match order total {}",
                request.amount, order.total_amount
            )));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(CoreError::conflict(format!("Order {} is cancelled", order.order_number)));
        }
        if let Some(existing) = self.payments.find_by_order(order.id).await? {
            return Err(CoreError::conflict(format!(
                "Payment {} already exists for order {}",
                existing.id, order.order_number
            )));
        }

        let payment = Payment::new(request);
        // The unique constraint on order_id settles races the check above lets through
        self.payments.insert_payment(&payment).await?;

        tracing::info!("Payment {} created for order {} ({})", payment.id, order.order_number, payment.amount);
        Ok(payment)
    }

    /// Settle a payment through the gateway. Always ends in `Completed` or
    /// `Failed`; a decline is a normal outcome, returned as the failed payment.
    pub async fn process_payment(
        &self,
        identity: &Identity,
        payment_id: Uuid,
        transaction_id: Option<String>,
        payment_details: Option<serde_json::Value>,
    ) -> CoreResult<Payment> {
        let mut payment = self.load_payment(payment_id).await?;
        let order = self.load_order(payment.order_id).await?;
        if !identity.is_self_or_admin(order.buyer_id) {
            return Err(CoreError::forbidden("Only the buyer or an admin can process this payment"));
        }

        let stale_before = Utc::now() - self.claim_lease;
        if !self.payments.claim_for_processing(payment_id, stale_before).await? {
            let current = self.load_payment(payment_id).await?;
            return Err(CoreError::conflict(format!(
                "Payment {} is {} and cannot be processed",
                payment_id, current.status
            )));
        }
        payment.apply_status(PaymentStatus::Processing, None);
        if payment_details.is_some() {
            payment.payment_details = payment_details;
        }

        let request = ChargeRequest {
            payment_id,
            order_id: order.id,
            amount: payment.amount,
            payment_method: payment.payment_method.clone(),
            payment_details: payment.payment_details.clone(),
        };

        let outcome = match self.gateway.charge(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Gateway error while settling payment {}: {}", payment_id, e);
                GatewayOutcome::Declined { reason: e.to_string() }
            }
        };

        match outcome {
            GatewayOutcome::Approved { transaction_id: gateway_txn } => {
                let txn = transaction_id
                    .filter(|t| !t.trim().is_empty())
                    .or(gateway_txn)
                    .unwrap_or_else(generate_transaction_id);
                payment.apply_status(PaymentStatus::Completed, Some(txn));
            }
            GatewayOutcome::Declined { reason } => {
                tracing::warn!("Payment {} for order {} declined: {}", payment_id, order.order_number, reason);
                payment.apply_status(PaymentStatus::Failed, None);
            }
        }

        if let Err(e) = self.settle(&payment, PaymentStatus::Processing).await {
            // A conflict means someone else owns the row now
            if !matches!(e, CoreError::Conflict(_)) {
                self.release_claim(&payment).await;
            }
            return Err(e);
        }

        tracing::info!("Payment {} for order {} settled as {}", payment_id, order.order_number, payment.status);
        self.publish(&order, EventPayload::PaymentSettled {
            payment_id,
            status: payment.status.to_string(),
            transaction_id: payment.transaction_id.clone(),
        });

        Ok(payment)
    }

    /// Refund a completed payment. Refunding twice is a conflict.
    pub async fn refund_payment(
        &self,
        identity: &Identity,
        payment_id: Uuid,
        reason: Option<String>,
    ) -> CoreResult<Payment> {
        let mut payment = self.load_payment(payment_id).await?;
        let order = self.load_order(payment.order_id).await?;
        if !identity.is_self_or_admin(order.seller_id) {
            return Err(CoreError::forbidden("Only the seller or an admin can refund a payment"));
        }

        match payment.status {
            PaymentStatus::Completed => {}
            PaymentStatus::Refunded => {
                return Err(CoreError::conflict(format!("Payment {} is already refunded", payment_id)));
            }
            other => {
                return Err(CoreError::conflict(format!(
                    "Payment {} is {}; only completed payments can be refunded",
                    payment_id, other
                )));
            }
        }

        let completed = payment.clone();
        payment.apply_status(PaymentStatus::Refunded, None);
        payment.refund_reason = reason.filter(|r| !r.trim().is_empty());

        // Take the refund before the gateway sees it, so it runs at most once
        if let Err(e) = self.settle(&payment, PaymentStatus::Completed).await {
            return Err(match e {
                CoreError::Conflict(_) => CoreError::conflict(format!("Payment {} is already refunded", payment_id)),
                other => other,
            });
        }

        if let Err(e) = self
            .gateway
            .refund(payment_id, payment.transaction_id.as_deref(), payment.amount)
            .await
        {
            tracing::error!("Gateway refund of payment {} failed: {}", payment_id, e);
            self.restore_completed(&completed).await;
            return Err(CoreError::internal(format!("Refund of payment {} failed: {}", payment_id, e)));
        }

        tracing::info!("Payment {} for order {} refunded", payment_id, order.order_number);
        self.publish(&order, EventPayload::PaymentRefunded {
            payment_id,
            reason: payment.refund_reason.clone(),
        });

        Ok(payment)
    }

    /// Administrative status write. `processed_at` follows `Completed`; the
    /// transaction id is only replaced when one is given.
    pub async fn update_payment_status(
        &self,
        identity: &Identity,
        payment_id: Uuid,
        status: PaymentStatus,
        transaction_id: Option<String>,
    ) -> CoreResult<Payment> {
        if !identity.is_admin() {
            return Err(CoreError::forbidden("Only admins can set payment status directly"));
        }

        let mut payment = self.load_payment(payment_id).await?;
        let previous = payment.status;

        let transaction_id = transaction_id.filter(|t| !t.trim().is_empty());
        let transaction_id = match (status, transaction_id) {
            (_, Some(txn)) => Some(txn),
            (PaymentStatus::Completed, None) if payment.transaction_id.is_none() => Some(generate_transaction_id()),
            (_, None) => None,
        };
        payment.apply_status(status, transaction_id);

        self.settle(&payment, previous).await?;

        tracing::info!("Payment {} moved from {} to {} by {}", payment_id, previous, status, identity.user_id);
        Ok(payment)
    }

    pub async fn get_payment(&self, identity: &Identity, payment_id: Uuid) -> CoreResult<Payment> {
        let payment = self.load_payment(payment_id).await?;
        let order = self.load_order(payment.order_id).await?;
        authorize_party(identity, &order)?;
        Ok(payment)
    }

    pub async fn payment_for_order(&self, identity: &Identity, order_id: Uuid) -> CoreResult<Payment> {
        let order = self.load_order(order_id).await?;
        authorize_party(identity, &order)?;
        self.payments.find_by_order(order_id).await?
            .ok_or_else(|| CoreError::NotFound(format!("Order {} has no payment", order.order_number)))
    }

    /// Write the payment and its order's payment status as one unit
    async fn settle(&self, payment: &Payment, expected: PaymentStatus) -> CoreResult<()> {
        let order_status = payment.status.implied_order_status();
        if !self.payments.record_settlement(payment, expected, order_status).await? {
            return Err(CoreError::conflict(format!(
                "Payment {} changed while it was being updated",
                payment.id
            )));
        }
        Ok(())
    }

    /// Best effort: hand a claimed payment back as failed so it can be retried
    /// at once instead of waiting out the claim lease
    async fn release_claim(&self, payment: &Payment) {
        let mut failed = payment.clone();
        failed.apply_status(PaymentStatus::Failed, None);
        match self
            .payments
            .record_settlement(&failed, PaymentStatus::Processing, Some(OrderPaymentStatus::Failed))
            .await
        {
            Ok(true) => tracing::warn!("Payment {} released as failed after a settlement error", payment.id),
            Ok(false) => tracing::warn!("Payment {} was no longer processing; claim not released", payment.id),
            Err(e) => tracing::error!("Could not release payment {}: {}", payment.id, e),
        }
    }

    /// Best effort: undo a refund the gateway did not carry out
    async fn restore_completed(&self, completed: &Payment) {
        match self
            .payments
            .record_settlement(completed, PaymentStatus::Refunded, completed.status.implied_order_status())
            .await
        {
            Ok(true) => tracing::warn!("Payment {} restored to completed", completed.id),
            Ok(false) => tracing::warn!("Payment {} changed before its refund could be undone", completed.id),
            Err(e) => tracing::error!("Could not restore payment {} after failed refund: {}", completed.id, e),
        }
    }

    async fn load_payment(&self, id: Uuid) -> CoreResult<Payment> {
        self.payments.get_payment(id).await?
            .ok_or_else(|| CoreError::not_found("Payment", id))
    }

    async fn load_order(&self, id: Uuid) -> CoreResult<Order> {
        self.orders.get_order(id).await?
            .ok_or_else(|| CoreError::not_found("Order", id))
    }

    fn publish(&self, order: &Order, payload: EventPayload) {
        self.events.publish(MarketEvent::new(order.id, order.buyer_id, order.seller_id, payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SimulatedGateway;
    use crate::testing::{Fixture, FlakySettlement, Spoil};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tradelink_core::payment::GatewayError;

    fn new_payment(order: &Order) -> NewPayment {
        NewPayment {
            order_id: order.id,
            amount: order.total_amount,
            payment_method: "card".to_string(),
            payment_details: Some(serde_json::json!({ "card_last4": "4242" })),
        }
    }

    struct BrokenGateway;

    #[async_trait]
    impl PaymentGateway for BrokenGateway {
        async fn charge(&self, _request: &ChargeRequest) -> Result<GatewayOutcome, GatewayError> {
            Err(GatewayError::Unavailable("connection refused".to_string()))
        }

        async fn refund(&self, _: Uuid, _: Option<&str>, _: Decimal) -> Result<(), GatewayError> {
            Err(GatewayError::Unavailable("connection refused".to_string()))
        }
    }

    /// Approves every charge and counts the refunds it is asked to make
    #[derive(Default)]
    struct CountingGateway {
        refunds: AtomicUsize,
    }

    impl CountingGateway {
        fn refunds(&self) -> usize {
            self.refunds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGateway for CountingGateway {
        async fn charge(&self, _request: &ChargeRequest) -> Result<GatewayOutcome, GatewayError> {
            Ok(GatewayOutcome::Approved { transaction_id: None })
        }

        async fn refund(&self, _: Uuid, _: Option<&str>, _: Decimal) -> Result<(), GatewayError> {
            self.refunds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn stored_payment(order: &Order, status: PaymentStatus, last_touched: chrono::DateTime<Utc>) -> Payment {
        let mut payment = Payment::new(new_payment(order));
        payment.apply_status(status, None);
        payment.updated_at = last_touched;
        payment
    }

    #[tokio::test]
    async fn test_one_payment_per_order() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_approve());
        let order = fx.place_order().await;

        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, dec!(30.00));

        let second = payments.create_payment(&fx.buyer, new_payment(&order)).await;
        assert!(matches!(second, Err(CoreError::Conflict(_))));

        // Order is untouched by creation
        let stored = fx.orders.get_order(&fx.buyer, order.id).await.unwrap().order;
        assert_eq!(stored.payment_status, OrderPaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_payment_rejections() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_approve());
        let order = fx.place_order().await;

        let mut wrong_amount = new_payment(&order);
        wrong_amount.amount = dec!(29.99);
        assert!(matches!(
            payments.create_payment(&fx.buyer, wrong_amount).await,
            Err(CoreError::ValidationError(_))
        ));

        let mut missing_order = new_payment(&order);
        missing_order.order_id = Uuid::new_v4();
        assert!(matches!(
            payments.create_payment(&fx.buyer, missing_order).await,
            Err(CoreError::NotFound(_))
        ));

        assert!(matches!(
            payments.create_payment(&fx.seller, new_payment(&order)).await,
            Err(CoreError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_settlement_marks_order_paid() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_approve());
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();

        let settled = payments.process_payment(&fx.buyer, payment.id, None, None).await.unwrap();

        assert_eq!(settled.status, PaymentStatus::Completed);
        assert!(settled.processed_at.is_some());
        assert!(settled.transaction_id.as_deref().is_some_and(|t| t.starts_with("TXN-")));

        let stored = fx.orders.get_order(&fx.buyer, order.id).await.unwrap().order;
        assert_eq!(stored.payment_status, OrderPaymentStatus::Paid);

        // Completed payments are not settled again
        let again = payments.process_payment(&fx.buyer, payment.id, None, None).await;
        assert!(matches!(again, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_caller_transaction_id_wins() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_approve());
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();

        let settled = payments
            .process_payment(&fx.buyer, payment.id, Some("BANK-REF-77".to_string()), None)
            .await
            .unwrap();
        assert_eq!(settled.transaction_id.as_deref(), Some("BANK-REF-77"));
    }

    #[tokio::test]
    async fn test_declined_settlement_marks_order_failed() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_decline());
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();

        let failed = payments.process_payment(&fx.buyer, payment.id, None, None).await.unwrap();

        assert_eq!(failed.status, PaymentStatus::Failed);
        assert!(failed.processed_at.is_none());
        assert!(failed.transaction_id.is_none());

        let stored = fx.orders.get_order(&fx.buyer, order.id).await.unwrap().order;
        assert_eq!(stored.payment_status, OrderPaymentStatus::Failed);

        // A failed payment may be retried
        let retried = payments.process_payment(&fx.buyer, payment.id, None, None).await.unwrap();
        assert_eq!(retried.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_gateway_error_is_a_failed_outcome() {
        let fx = Fixture::new().await;
        let payments = fx.payments(BrokenGateway);
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();

        let failed = payments.process_payment(&fx.buyer, payment.id, None, None).await.unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_settlement_write_releases_the_claim() {
        let fx = Fixture::new().await;
        let flaky = Arc::new(FlakySettlement::new(fx.store.clone(), Spoil::Error, 1));
        let payments = fx.payments_over(flaky, Arc::new(SimulatedGateway::always_approve()));
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();

        let result = payments.process_payment(&fx.buyer, payment.id, None, None).await;
        assert!(matches!(result, Err(CoreError::InternalError(_))));

        // Not stranded in processing
        let stored = PaymentRepository::get_payment(fx.store.as_ref(), payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert!(stored.processed_at.is_none());
        let stored_order = OrderRepository::get_order(fx.store.as_ref(), order.id).await.unwrap().unwrap();
        assert_eq!(stored_order.payment_status, OrderPaymentStatus::Failed);
        assert!(fx.events.take().iter().all(|e| !matches!(e.payload, EventPayload::PaymentSettled { .. })));

        let retried = payments.process_payment(&fx.buyer, payment.id, None, None).await.unwrap();
        assert_eq!(retried.status, PaymentStatus::Completed);
        let stored_order = OrderRepository::get_order(fx.store.as_ref(), order.id).await.unwrap().unwrap();
        assert_eq!(stored_order.payment_status, OrderPaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_abandoned_processing_claim_expires() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_approve());

        let busy_order = fx.place_order().await;
        let busy = stored_payment(&busy_order, PaymentStatus::Processing, Utc::now());
        PaymentRepository::insert_payment(fx.store.as_ref(), &busy).await.unwrap();

        let held = payments.process_payment(&fx.buyer, busy.id, None, None).await;
        assert!(matches!(held, Err(CoreError::Conflict(_))));

        let stale_order = fx.place_order().await;
        let stale = stored_payment(&stale_order, PaymentStatus::Processing, Utc::now() - Duration::minutes(30));
        PaymentRepository::insert_payment(fx.store.as_ref(), &stale).await.unwrap();

        // Still held under a longer lease
        let patient = fx.payments(SimulatedGateway::always_approve()).with_claim_lease(Duration::hours(1));
        let held = patient.process_payment(&fx.buyer, stale.id, None, None).await;
        assert!(matches!(held, Err(CoreError::Conflict(_))));

        let settled = payments.process_payment(&fx.buyer, stale.id, None, None).await.unwrap();
        assert_eq!(settled.status, PaymentStatus::Completed);
        let stored_order = OrderRepository::get_order(fx.store.as_ref(), stale_order.id).await.unwrap().unwrap();
        assert_eq!(stored_order.payment_status, OrderPaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_refund_reaches_the_gateway_once() {
        let fx = Fixture::new().await;
        let gateway = Arc::new(CountingGateway::default());
        let payments = fx.payments_over(fx.store.clone(), gateway.clone());
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();
        payments.process_payment(&fx.buyer, payment.id, None, None).await.unwrap();

        payments.refund_payment(&fx.seller, payment.id, None).await.unwrap();
        let twice = payments.refund_payment(&fx.admin, payment.id, None).await;
        assert!(matches!(twice, Err(CoreError::Conflict(_))));
        assert_eq!(gateway.refunds(), 1);

        // Losing the guard to a concurrent refund keeps the gateway out of it
        let raced_order = fx.place_order().await;
        let raced = payments.create_payment(&fx.buyer, new_payment(&raced_order)).await.unwrap();
        payments.process_payment(&fx.buyer, raced.id, None, None).await.unwrap();

        let flaky = Arc::new(FlakySettlement::new(fx.store.clone(), Spoil::LoseGuard, 1));
        let racing = fx.payments_over(flaky, gateway.clone());
        let lost = racing.refund_payment(&fx.seller, raced.id, None).await;
        assert!(matches!(lost, Err(CoreError::Conflict(msg)) if msg.contains("already refunded")));
        assert_eq!(gateway.refunds(), 1);

        let stored = PaymentRepository::get_payment(fx.store.as_ref(), raced.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_refund_is_guarded() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_approve());
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();

        let premature = payments.refund_payment(&fx.seller, payment.id, None).await;
        assert!(matches!(premature, Err(CoreError::Conflict(_))));

        payments.process_payment(&fx.buyer, payment.id, None, None).await.unwrap();

        let by_buyer = payments.refund_payment(&fx.buyer, payment.id, None).await;
        assert!(matches!(by_buyer, Err(CoreError::Forbidden(_))));

        let refunded = payments
            .refund_payment(&fx.seller, payment.id, Some("Goods returned".to_string()))
            .await
            .unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        assert!(refunded.processed_at.is_none());
        assert!(refunded.transaction_id.is_some());
        assert_eq!(refunded.refund_reason.as_deref(), Some("Goods returned"));

        let stored = fx.orders.get_order(&fx.buyer, order.id).await.unwrap().order;
        assert_eq!(stored.payment_status, OrderPaymentStatus::Refunded);

        let twice = payments.refund_payment(&fx.admin, payment.id, None).await;
        assert!(matches!(twice, Err(CoreError::Conflict(_))));
        let still = payments.get_payment(&fx.buyer, payment.id).await.unwrap();
        assert_eq!(still.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_gateway_failure_leaves_payment_completed() {
        let fx = Fixture::new().await;
        let approving = fx.payments(SimulatedGateway::always_approve());
        let order = fx.place_order().await;
        let payment = approving.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();
        approving.process_payment(&fx.buyer, payment.id, None, None).await.unwrap();

        let broken = fx.payments(BrokenGateway);
        let result = broken.refund_payment(&fx.admin, payment.id, None).await;
        assert!(matches!(result, Err(CoreError::InternalError(_))));

        let stored = broken.get_payment(&fx.admin, payment.id).await.unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert!(stored.processed_at.is_some());
        assert!(stored.refund_reason.is_none());
        let stored_order = OrderRepository::get_order(fx.store.as_ref(), order.id).await.unwrap().unwrap();
        assert_eq!(stored_order.payment_status, OrderPaymentStatus::Paid);

        // The refund can be tried again once the gateway is back
        let refunded = approving.refund_payment(&fx.admin, payment.id, None).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_admin_status_update() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_approve());
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();

        let denied = payments.update_payment_status(&fx.seller, payment.id, PaymentStatus::Completed, None).await;
        assert!(matches!(denied, Err(CoreError::Forbidden(_))));

        let completed = payments
            .update_payment_status(&fx.admin, payment.id, PaymentStatus::Completed, Some("WIRE-1".to_string()))
            .await
            .unwrap();
        assert!(completed.processed_at.is_some());
        assert_eq!(completed.transaction_id.as_deref(), Some("WIRE-1"));

        let failed = payments
            .update_payment_status(&fx.admin, payment.id, PaymentStatus::Failed, None)
            .await
            .unwrap();
        assert!(failed.processed_at.is_none());
        assert_eq!(failed.transaction_id.as_deref(), Some("WIRE-1"));

        let stored = fx.orders.get_order(&fx.buyer, order.id).await.unwrap().order;
        assert_eq!(stored.payment_status, OrderPaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_payment_reads_are_scoped() {
        let fx = Fixture::new().await;
        let payments = fx.payments(SimulatedGateway::always_approve());
        let order = fx.place_order().await;
        let payment = payments.create_payment(&fx.buyer, new_payment(&order)).await.unwrap();
        let stranger = Identity::new(Uuid::new_v4(), tradelink_core::Role::Importer);

        assert_eq!(payments.payment_for_order(&fx.seller, order.id).await.unwrap().id, payment.id);
        assert!(matches!(payments.get_payment(&stranger, payment.id).await, Err(CoreError::Forbidden(_))));
        assert!(matches!(payments.get_payment(&fx.buyer, Uuid::new_v4()).await, Err(CoreError::NotFound(_))));
    }
}

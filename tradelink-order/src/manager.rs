use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tradelink_core::{
    CatalogLookup, CoreError, CoreResult, EventPublisher, Identity, NoopPublisher,
};
use tradelink_shared::{EventPayload, MarketEvent};
use uuid::Uuid;

use crate::hooks::{InventoryHook, NoopInventoryHook};
use crate::models::{NewOrder, Order, OrderDetails, OrderPaymentStatus, OrderStatus};
use crate::repository::{OrderRepository, PaymentRepository};

/// Where the unit price of a new order comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePolicy {
    /// The caller's price must equal the catalog price
    #[default]
    Catalog,
    /// The caller's price is taken as-is
    Client,
}

#[derive(Debug, Clone, Copy)]
pub struct OrderPolicy {
    pub price: PricePolicy,
    /// Reject orders for more than the catalog's available quantity
    pub enforce_stock: bool,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            price: PricePolicy::Catalog,
            enforce_stock: true,
        }
    }
}

/// Manages order creation, lifecycle transitions and scoped reads
pub struct OrderManager {
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    catalog: Arc<dyn CatalogLookup>,
    inventory: Arc<dyn InventoryHook>,
    events: Arc<dyn EventPublisher>,
    policy: OrderPolicy,
}

impl OrderManager {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        catalog: Arc<dyn CatalogLookup>,
    ) -> Self {
        Self {
            orders,
            payments,
            catalog,
            inventory: Arc::new(NoopInventoryHook),
            events: Arc::new(NoopPublisher),
            policy: OrderPolicy::default(),
        }
    }

    pub fn with_inventory_hook(mut self, hook: Arc<dyn InventoryHook>) -> Self {
        self.inventory = hook;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    pub fn with_policy(mut self, policy: OrderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Place an order for a catalog product. The seller is whoever owns the
    /// product; the buyer is the caller.
    pub async fn create_order(&self, identity: &Identity, request: NewOrder) -> CoreResult<OrderDetails> {
        request.validate()?;

        let product = self.catalog.find_product(request.product_id).await?
            .ok_or_else(|| CoreError::not_found("Product", request.product_id))?;

        if product.seller_id == identity.user_id {
            return Err(CoreError::validation("Sellers cannot order their own products"));
        }

        if self.policy.price == PricePolicy::Catalog && request.unit_price != product.price {
            return Err(CoreError::validation(format!(
                "Unit price {} does not match the catalog price {}",
                request.unit_price, product.price
            )));
        }

        if self.policy.enforce_stock && request.quantity > product.available_quantity {
            return Err(CoreError::validation(format!(
                "Requested quantity {} exceeds available stock {}",
                request.quantity, product.available_quantity
            )));
        }

        let order = Order::new(request, identity.user_id, product.seller_id)?;
        self.orders.insert_order(&order).await?;

        tracing::info!(
            "Order {} placed by {} with seller {} for {}",
            order.order_number, order.buyer_id, order.seller_id, order.total_amount
        );
        self.publish(&order, EventPayload::OrderPlaced {
            order_number: order.order_number.clone(),
            total_amount: order.total_amount,
        });

        Ok(OrderDetails {
            order,
            product_name: Some(product.name),
        })
    }

    /// Fetch one order visible to the caller, repairing its payment status
    /// from the payment record when the two have drifted apart
    pub async fn get_order(&self, identity: &Identity, id: Uuid) -> CoreResult<OrderDetails> {
        let mut order = self.load(id).await?;
        authorize_party(identity, &order)?;
        self.reconcile(&mut order).await?;

        let product_name = match self.catalog.find_product(order.product_id).await {
            Ok(product) => product.map(|p| p.name),
            Err(e) => {
                tracing::warn!("Catalog lookup failed for product {}: {}", order.product_id, e);
                None
            }
        };

        Ok(OrderDetails { order, product_name })
    }

    /// Every order in the marketplace; admins only
    pub async fn list_orders(&self, identity: &Identity) -> CoreResult<Vec<Order>> {
        if !identity.is_admin() {
            return Err(CoreError::forbidden("Only admins can list all orders"));
        }
        let orders = self.orders.list_orders().await?;
        self.reconcile_all(orders).await
    }

    pub async fn orders_for_buyer(&self, identity: &Identity) -> CoreResult<Vec<Order>> {
        let orders = self.orders.list_orders_by_buyer(identity.user_id).await?;
        self.reconcile_all(orders).await
    }

    pub async fn orders_for_seller(&self, identity: &Identity) -> CoreResult<Vec<Order>> {
        let orders = self.orders.list_orders_by_seller(identity.user_id).await?;
        self.reconcile_all(orders).await
    }

    /// Move an order along its lifecycle.
    /// Sellers confirm, ship and deliver; either party may cancel.
    pub async fn update_order_status(
        &self,
        identity: &Identity,
        id: Uuid,
        next: OrderStatus,
    ) -> CoreResult<Order> {
        let mut order = self.load(id).await?;
        authorize_transition(identity, &order, next)?;

        let previous = order.status;
        order.transition_to(next)?;

        if !self.orders.update_order_status(id, previous, next).await? {
            return Err(CoreError::conflict(format!(
                "Order {} was modified concurrently",
                order.order_number
            )));
        }

        tracing::info!("Order {} moved from {} to {}", order.order_number, previous, next);

        let hook_result = match next {
            OrderStatus::Confirmed => self.inventory.on_order_confirmed(&order).await,
            OrderStatus::Cancelled => self.inventory.on_order_cancelled(&order).await,
            _ => Ok(()),
        };
        if let Err(e) = hook_result {
            tracing::warn!("Inventory hook failed for order {}: {}", order.order_number, e);
        }

        self.publish(&order, EventPayload::OrderStatusChanged {
            from: previous.to_string(),
            to: next.to_string(),
        });

        Ok(order)
    }

    /// Manual override of the order's payment status (e.g. cash on delivery).
    /// Refused when a payment record already says otherwise.
    pub async fn update_payment_status(
        &self,
        identity: &Identity,
        id: Uuid,
        status: OrderPaymentStatus,
    ) -> CoreResult<Order> {
        let mut order = self.load(id).await?;
        if !identity.is_self_or_admin(order.seller_id) {
            return Err(CoreError::forbidden("Only the seller or an admin can change the payment status"));
        }

        if let Some(payment) = self.payments.find_by_order(id).await? {
            match payment.status.implied_order_status() {
                Some(implied) if implied == status => {}
                Some(implied) => {
                    return Err(CoreError::conflict(format!(
                        "Payment {} implies payment status {}",
                        payment.id, implied
                    )));
                }
                None => {
                    return Err(CoreError::conflict(format!(
                        "Payment {} is still {}",
                        payment.id, payment.status
                    )));
                }
            }
        }

        if !self.orders.update_payment_status(id, status).await? {
            return Err(CoreError::not_found("Order", id));
        }
        order.set_payment_status(status);

        tracing::info!("Order {} payment status set to {} by {}", order.order_number, status, identity.user_id);
        Ok(order)
    }

    /// Hard delete. Admins may delete anything; buyers only orders that are
    /// still pending or already cancelled.
    pub async fn delete_order(&self, identity: &Identity, id: Uuid) -> CoreResult<()> {
        let order = self.load(id).await?;

        if !identity.is_admin() {
            if identity.user_id != order.buyer_id {
                return Err(CoreError::forbidden("Only the buyer or an admin can delete an order"));
            }
            if !matches!(order.status, OrderStatus::Pending | OrderStatus::Cancelled) {
                return Err(CoreError::conflict(format!(
                    "Order {} is {} and can no longer be deleted",
                    order.order_number, order.status
                )));
            }
        }

        if !self.orders.delete_order(id).await? {
            return Err(CoreError::not_found("Order", id));
        }

        tracing::info!("Order {} deleted by {}", order.order_number, identity.user_id);
        Ok(())
    }

    /// Explicit reconciliation; returns the order and whether it was repaired
    pub async fn reconcile_payment_status(&self, identity: &Identity, id: Uuid) -> CoreResult<(Order, bool)> {
        if !identity.is_admin() {
            return Err(CoreError::forbidden("Only admins can reconcile orders"));
        }
        let mut order = self.load(id).await?;
        let repaired = self.reconcile(&mut order).await?;
        Ok((order, repaired))
    }

    async fn load(&self, id: Uuid) -> CoreResult<Order> {
        self.orders.get_order(id).await?
            .ok_or_else(|| CoreError::not_found("Order", id))
    }

    /// The payment record is the source of truth for settled states
    async fn reconcile(&self, order: &mut Order) -> CoreResult<bool> {
        let Some(payment) = self.payments.find_by_order(order.id).await? else {
            return Ok(false);
        };
        let Some(implied) = payment.status.implied_order_status() else {
            return Ok(false);
        };
        if implied == order.payment_status {
            return Ok(false);
        }

        tracing::warn!(
            "Order {} payment status {} disagrees with payment {} ({}); repairing",
            order.order_number, order.payment_status, payment.id, payment.status
        );
        self.orders.update_payment_status(order.id, implied).await?;
        order.set_payment_status(implied);
        Ok(true)
    }

    async fn reconcile_all(&self, mut orders: Vec<Order>) -> CoreResult<Vec<Order>> {
        for order in orders.iter_mut() {
            self.reconcile(order).await?;
        }
        Ok(orders)
    }

    fn publish(&self, order: &Order, payload: EventPayload) {
        self.events.publish(MarketEvent::new(order.id, order.buyer_id, order.seller_id, payload));
    }
}

/// Buyer, seller or admin
pub(crate) fn authorize_party(identity: &Identity, order: &Order) -> CoreResult<()> {
    if identity.is_admin() || order.is_party(identity.user_id) {
        Ok(())
    } else {
        Err(CoreError::forbidden(format!(
            "Order {} belongs to other parties",
            order.order_number
        )))
    }
}

fn authorize_transition(identity: &Identity, order: &Order, next: OrderStatus) -> CoreResult<()> {
    if identity.is_admin() {
        return Ok(());
    }
    let allowed = match next {
        OrderStatus::Confirmed | OrderStatus::Shipped | OrderStatus::Delivered => {
            identity.user_id == order.seller_id
        }
        OrderStatus::Cancelled => order.is_party(identity.user_id),
        OrderStatus::Pending => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(CoreError::forbidden(format!(
            "Not allowed to move order {} to {}",
            order.order_number, next
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPayment, Payment, PaymentStatus};
    use crate::testing::{new_order, Fixture};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tradelink_core::Role;

    #[tokio::test]
    async fn test_create_order_derives_seller_and_total() {
        let fx = Fixture::new().await;

        let details = fx.orders.create_order(&fx.buyer, new_order(fx.product_id, 3, dec!(10.00))).await.unwrap();
        let order = details.order;

        assert_eq!(order.total_amount, dec!(30.00));
        assert_eq!(order.seller_id, fx.seller.user_id);
        assert_eq!(order.buyer_id, fx.buyer.user_id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, OrderPaymentStatus::Pending);
        assert_eq!(details.product_name.as_deref(), Some("Cocoa beans, 60kg bag"));

        let events = fx.events.take();
        assert!(matches!(events[0].payload, EventPayload::OrderPlaced { .. }));
    }

    #[tokio::test]
    async fn test_create_order_rejections() {
        let fx = Fixture::new().await;

        let missing = fx.orders.create_order(&fx.buyer, new_order(Uuid::new_v4(), 1, dec!(10.00))).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));

        let own = fx.orders.create_order(&fx.seller, new_order(fx.product_id, 1, dec!(10.00))).await;
        assert!(matches!(own, Err(CoreError::ValidationError(_))));

        let cheap = fx.orders.create_order(&fx.buyer, new_order(fx.product_id, 1, dec!(1.00))).await;
        assert!(matches!(cheap, Err(CoreError::ValidationError(_))));

        let too_many = fx.orders.create_order(&fx.buyer, new_order(fx.product_id, 1_000, dec!(10.00))).await;
        assert!(matches!(too_many, Err(CoreError::ValidationError(_))));

        let zero = fx.orders.create_order(&fx.buyer, new_order(fx.product_id, 0, dec!(10.00))).await;
        assert!(matches!(zero, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_client_price_policy_trusts_caller() {
        let fx = Fixture::with_policy(OrderPolicy { price: PricePolicy::Client, enforce_stock: false }).await;

        let order = fx.orders.create_order(&fx.buyer, new_order(fx.product_id, 1_000, dec!(7.50))).await.unwrap().order;
        assert_eq!(order.total_amount, dec!(7500.00));
    }

    #[tokio::test]
    async fn test_client_price_policy_rejects_unstorable_totals() {
        let fx = Fixture::with_policy(OrderPolicy { price: PricePolicy::Client, enforce_stock: false }).await;

        let overflow = fx.orders.create_order(&fx.buyer, new_order(fx.product_id, 2, Decimal::MAX)).await;
        assert!(matches!(overflow, Err(CoreError::ValidationError(_))));

        let fractional = fx.orders.create_order(&fx.buyer, new_order(fx.product_id, 1, dec!(7.505))).await;
        assert!(matches!(fractional, Err(CoreError::ValidationError(_))));

        assert!(fx.orders.list_orders(&fx.admin).await.unwrap().is_empty());
        assert!(fx.events.take().is_empty());
    }

    #[tokio::test]
    async fn test_listings_are_scoped() {
        let fx = Fixture::new().await;
        let other_buyer = Identity::new(Uuid::new_v4(), Role::Importer);

        fx.orders.create_order(&fx.buyer, new_order(fx.product_id, 1, dec!(10.00))).await.unwrap();
        fx.orders.create_order(&other_buyer, new_order(fx.product_id, 2, dec!(10.00))).await.unwrap();

        assert_eq!(fx.orders.orders_for_buyer(&fx.buyer).await.unwrap().len(), 1);
        assert_eq!(fx.orders.orders_for_buyer(&other_buyer).await.unwrap().len(), 1);
        assert_eq!(fx.orders.orders_for_seller(&fx.seller).await.unwrap().len(), 2);
        assert!(fx.orders.orders_for_seller(&fx.buyer).await.unwrap().is_empty());

        assert!(matches!(fx.orders.list_orders(&fx.buyer).await, Err(CoreError::Forbidden(_))));
        assert_eq!(fx.orders.list_orders(&fx.admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let fx = Fixture::new().await;
        let order = fx.place_order().await;

        let confirmed = fx.orders.update_order_status(&fx.seller, order.id, OrderStatus::Confirmed).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(fx.inventory.confirmed(), vec![order.id]);

        fx.orders.update_order_status(&fx.seller, order.id, OrderStatus::Shipped).await.unwrap();
        fx.orders.update_order_status(&fx.seller, order.id, OrderStatus::Delivered).await.unwrap();

        let stored = fx.orders.get_order(&fx.buyer, order.id).await.unwrap().order;
        assert_eq!(stored.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_invalid_transition() {
        let fx = Fixture::new().await;
        let order = fx.place_order().await;

        // Cannot ship before confirmation
        let result = fx.orders.update_order_status(&fx.seller, order.id, OrderStatus::Shipped).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));

        fx.orders.update_order_status(&fx.buyer, order.id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(fx.inventory.cancelled(), vec![order.id]);

        let result = fx.orders.update_order_status(&fx.admin, order.id, OrderStatus::Pending).await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_transition_authorization() {
        let fx = Fixture::new().await;
        let order = fx.place_order().await;
        let stranger = Identity::new(Uuid::new_v4(), Role::Exporter);

        let buyer_confirms = fx.orders.update_order_status(&fx.buyer, order.id, OrderStatus::Confirmed).await;
        assert!(matches!(buyer_confirms, Err(CoreError::Forbidden(_))));

        let stranger_cancels = fx.orders.update_order_status(&stranger, order.id, OrderStatus::Cancelled).await;
        assert!(matches!(stranger_cancels, Err(CoreError::Forbidden(_))));

        assert!(matches!(fx.orders.get_order(&stranger, order.id).await, Err(CoreError::Forbidden(_))));

        let missing = fx.orders.update_order_status(&fx.admin, Uuid::new_v4(), OrderStatus::Confirmed).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_read_repairs_diverged_payment_status() {
        let fx = Fixture::new().await;
        let order = fx.place_order().await;

        // Payment committed without its order update
        let mut payment = Payment::new(NewPayment {
            order_id: order.id,
            amount: order.total_amount,
            payment_method: "card".to_string(),
            payment_details: None,
        });
        payment.apply_status(PaymentStatus::Completed, Some("TXN-LOST".to_string()));
        PaymentRepository::insert_payment(fx.store.as_ref(), &payment).await.unwrap();

        let repaired = fx.orders.get_order(&fx.buyer, order.id).await.unwrap().order;
        assert_eq!(repaired.payment_status, OrderPaymentStatus::Paid);

        let (_, changed) = fx.orders.reconcile_payment_status(&fx.admin, order.id).await.unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn test_listings_repair_diverged_payment_status() {
        let fx = Fixture::new().await;
        let order = fx.place_order().await;
        let untouched = fx.place_order().await;

        let mut payment = Payment::new(NewPayment {
            order_id: order.id,
            amount: order.total_amount,
            payment_method: "card".to_string(),
            payment_details: None,
        });
        payment.apply_status(PaymentStatus::Completed, Some("TXN-LOST".to_string()));
        PaymentRepository::insert_payment(fx.store.as_ref(), &payment).await.unwrap();

        let status_of = |orders: &[Order], id: Uuid| {
            orders.iter().find(|o| o.id == id).map(|o| o.payment_status)
        };

        let mine = fx.orders.orders_for_buyer(&fx.buyer).await.unwrap();
        assert_eq!(status_of(&mine, order.id), Some(OrderPaymentStatus::Paid));
        assert_eq!(status_of(&mine, untouched.id), Some(OrderPaymentStatus::Pending));

        let sold = fx.orders.orders_for_seller(&fx.seller).await.unwrap();
        assert_eq!(status_of(&sold, order.id), Some(OrderPaymentStatus::Paid));
        let all = fx.orders.list_orders(&fx.admin).await.unwrap();
        assert_eq!(status_of(&all, order.id), Some(OrderPaymentStatus::Paid));

        // The repair is persisted, not just reported
        let stored = OrderRepository::get_order(fx.store.as_ref(), order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, OrderPaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_manual_payment_override() {
        let fx = Fixture::new().await;
        let order = fx.place_order().await;

        let forbidden = fx.orders.update_payment_status(&fx.buyer, order.id, OrderPaymentStatus::Paid).await;
        assert!(matches!(forbidden, Err(CoreError::Forbidden(_))));

        let updated = fx.orders.update_payment_status(&fx.seller, order.id, OrderPaymentStatus::Paid).await.unwrap();
        assert_eq!(updated.payment_status, OrderPaymentStatus::Paid);

        // Once a payment record exists it wins
        let other = fx.place_order().await;
        let payment = Payment::new(NewPayment {
            order_id: other.id,
            amount: other.total_amount,
            payment_method: "card".to_string(),
            payment_details: None,
        });
        PaymentRepository::insert_payment(fx.store.as_ref(), &payment).await.unwrap();
        let conflict = fx.orders.update_payment_status(&fx.admin, other.id, OrderPaymentStatus::Paid).await;
        assert!(matches!(conflict, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let fx = Fixture::new().await;
        let order = fx.place_order().await;

        fx.orders.update_order_status(&fx.seller, order.id, OrderStatus::Confirmed).await.unwrap();
        let late = fx.orders.delete_order(&fx.buyer, order.id).await;
        assert!(matches!(late, Err(CoreError::Conflict(_))));

        let by_seller = fx.orders.delete_order(&fx.seller, order.id).await;
        assert!(matches!(by_seller, Err(CoreError::Forbidden(_))));

        fx.orders.delete_order(&fx.admin, order.id).await.unwrap();
        assert!(matches!(fx.orders.get_order(&fx.admin, order.id).await, Err(CoreError::NotFound(_))));
    }
}

use axum::{extract::State, Extension};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradelink_core::Identity;
use tradelink_order::models::{NewOrder, ShippingAddress};
use tradelink_order::{Order, OrderDetails, OrderPaymentStatus, OrderStatus};
use uuid::Uuid;

use crate::extract::{ApiJson, ApiPath};
use crate::response::{created, ok, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub notes: Option<String>,
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(req: CreateOrderRequest) -> Self {
        NewOrder {
            product_id: req.product_id,
            quantity: req.quantity,
            unit_price: req.unit_price,
            shipping_address: req.shipping_address,
            payment_method: req.payment_method,
            notes: req.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderPaymentRequest {
    pub payment_status: OrderPaymentStatus,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub order: Order,
    pub repaired: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /order/create
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> ApiResult<OrderDetails> {
    let order = state.orders.create_order(&identity, req.into()).await?;
    created(order, "Order created successfully")
}

/// GET /order/all
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Order>> {
    let orders = state.orders.list_orders(&identity).await?;
    ok(orders, "Orders retrieved successfully")
}

/// GET /order/{id}
/// Reconciles the payment status before answering
pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(order_id): ApiPath<Uuid>,
) -> ApiResult<OrderDetails> {
    let order = state.orders.get_order(&identity, order_id).await?;
    ok(order, "Order retrieved successfully")
}

/// GET /order/buyer/orders
pub async fn buyer_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Order>> {
    let orders = state.orders.orders_for_buyer(&identity).await?;
    ok(orders, "Buyer orders retrieved successfully")
}

/// GET /order/seller/orders
pub async fn seller_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Order>> {
    let orders = state.orders.orders_for_seller(&identity).await?;
    ok(orders, "Seller orders retrieved successfully")
}

/// PUT /order/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(order_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateOrderStatusRequest>,
) -> ApiResult<Order> {
    let order = state.orders.update_order_status(&identity, order_id, req.status).await?;
    ok(order, "Order status updated successfully")
}

/// PUT /order/{id}/payment
pub async fn update_payment_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(order_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateOrderPaymentRequest>,
) -> ApiResult<Order> {
    let order = state.orders.update_payment_status(&identity, order_id, req.payment_status).await?;
    ok(order, "Payment status updated successfully")
}

/// DELETE /order/{id}
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(order_id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.orders.delete_order(&identity, order_id).await?;
    ok((), "Order deleted successfully")
}

/// POST /order/{id}/reconcile
pub async fn reconcile_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(order_id): ApiPath<Uuid>,
) -> ApiResult<ReconcileResponse> {
    let (order, repaired) = state.orders.reconcile_payment_status(&identity, order_id).await?;
    let message = if repaired { "Order payment status repaired" } else { "Order payment status already consistent" };
    ok(ReconcileResponse { order, repaired }, message)
}

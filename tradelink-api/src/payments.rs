use axum::{body::Bytes, extract::State, http::StatusCode, Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tradelink_core::Identity;
use tradelink_order::models::NewPayment;
use tradelink_order::{Payment, PaymentStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{optional_body, ApiJson, ApiPath};
use crate::response::{created, ok, ApiResponse, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_details: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProcessPaymentRequest {
    pub transaction_id: Option<String>,
    pub payment_details: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundPaymentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /payment/create
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> ApiResult<Payment> {
    let payment = state.payments
        .create_payment(&identity, NewPayment {
            order_id: req.order_id,
            amount: req.amount,
            payment_method: req.payment_method,
            payment_details: req.payment_details,
        })
        .await
        .map_err(|e| AppError::from(e).conflict_as_bad_request())?;

    created(payment, "Payment created successfully")
}

/// GET /payment/{payment_id}
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(payment_id): ApiPath<Uuid>,
) -> ApiResult<Payment> {
    let payment = state.payments.get_payment(&identity, payment_id).await?;
    ok(payment, "Payment retrieved successfully")
}

/// GET /payment/order/{order_id}
pub async fn order_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(order_id): ApiPath<Uuid>,
) -> ApiResult<Payment> {
    let payment = state.payments.payment_for_order(&identity, order_id).await?;
    ok(payment, "Payment retrieved successfully")
}

/// POST /payment/{payment_id}/process
/// A declined payment is answered with 400 and the failed payment as data
pub async fn process_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(payment_id): ApiPath<Uuid>,
    body: Bytes,
) -> ApiResult<Payment> {
    let req: ProcessPaymentRequest = optional_body(&body)?;
    let payment = state.payments
        .process_payment(&identity, payment_id, req.transaction_id, req.payment_details)
        .await?;

    if payment.status == PaymentStatus::Completed {
        ok(payment, "Payment processed successfully")
    } else {
        Ok((StatusCode::BAD_REQUEST, Json(ApiResponse::failure_with(payment, "Payment failed"))))
    }
}

/// POST /payment/{payment_id}/refund
pub async fn refund_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(payment_id): ApiPath<Uuid>,
    body: Bytes,
) -> ApiResult<Payment> {
    let req: RefundPaymentRequest = optional_body(&body)?;
    let payment = state.payments
        .refund_payment(&identity, payment_id, req.reason)
        .await
        .map_err(|e| AppError::from(e).conflict_as_bad_request())?;

    ok(payment, "Payment refunded successfully")
}

/// PUT /payment/{payment_id}/status
pub async fn update_payment_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(payment_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePaymentStatusRequest>,
) -> ApiResult<Payment> {
    let payment = state.payments
        .update_payment_status(&identity, payment_id, req.status, req.transaction_id)
        .await?;
    ok(payment, "Payment status updated successfully")
}

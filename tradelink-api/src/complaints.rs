use axum::{extract::State, Extension};
use serde::Deserialize;
use tradelink_core::Identity;
use tradelink_order::models::{ComplaintCategory, ComplaintPatch, ComplaintPriority, NewComplaint};
use tradelink_order::Complaint;
use uuid::Uuid;

use crate::extract::{ApiJson, ApiPath};
use crate::response::{created, ok, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateComplaintRequest {
    pub order_id: Uuid,
    pub subject: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: Option<ComplaintPriority>,
}

/// POST /complaint/create
pub async fn create_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(req): ApiJson<CreateComplaintRequest>,
) -> ApiResult<Complaint> {
    let complaint = state.complaints
        .create_complaint(&identity, NewComplaint {
            order_id: req.order_id,
            subject: req.subject,
            description: req.description,
            category: req.category,
            priority: req.priority,
        })
        .await?;
    created(complaint, "Complaint filed successfully")
}

/// GET /complaint/all
pub async fn list_complaints(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Complaint>> {
    let complaints = state.complaints.list_complaints(&identity).await?;
    ok(complaints, "Complaints retrieved successfully")
}

/// GET /complaint/buyer/complaints
pub async fn buyer_complaints(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Complaint>> {
    let complaints = state.complaints.complaints_for_buyer(&identity).await?;
    ok(complaints, "Buyer complaints retrieved successfully")
}

/// GET /complaint/seller/complaints
pub async fn seller_complaints(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Complaint>> {
    let complaints = state.complaints.complaints_for_seller(&identity).await?;
    ok(complaints, "Seller complaints retrieved successfully")
}

/// GET /complaint/{id}
pub async fn get_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(complaint_id): ApiPath<Uuid>,
) -> ApiResult<Complaint> {
    let complaint = state.complaints.get_complaint(&identity, complaint_id).await?;
    ok(complaint, "Complaint retrieved successfully")
}

/// PUT /complaint/{id}
pub async fn update_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(complaint_id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<ComplaintPatch>,
) -> ApiResult<Complaint> {
    let complaint = state.complaints.update_complaint(&identity, complaint_id, patch).await?;
    ok(complaint, "Complaint updated successfully")
}

/// DELETE /complaint/{id}
pub async fn delete_complaint(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(complaint_id): ApiPath<Uuid>,
) -> ApiResult<()> {
    state.complaints.delete_complaint(&identity, complaint_id).await?;
    ok((), "Complaint deleted successfully")
}

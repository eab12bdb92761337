use std::sync::Arc;

use tradelink_core::{CoreError, CoreResult, EventPublisher, Identity, NoopPublisher};
use tradelink_shared::{EventPayload, MarketEvent};
use uuid::Uuid;

use crate::models::{Complaint, ComplaintPatch, NewComplaint};
use crate::repository::{ComplaintRepository, OrderRepository};

/// Buyer-filed disputes and the seller/admin resolution workflow
pub struct ComplaintManager {
    orders: Arc<dyn OrderRepository>,
    complaints: Arc<dyn ComplaintRepository>,
    events: Arc<dyn EventPublisher>,
}

impl ComplaintManager {
    pub fn new(orders: Arc<dyn OrderRepository>, complaints: Arc<dyn ComplaintRepository>) -> Self {
        Self {
            orders,
            complaints,
            events: Arc::new(NoopPublisher),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    pub async fn create_complaint(&self, identity: &Identity, request: NewComplaint) -> CoreResult<Complaint> {
        request.validate()?;

        let order = self.orders.get_order(request.order_id).await?
            .ok_or_else(|| CoreError::not_found("Order", request.order_id))?;
        if identity.user_id != order.buyer_id {
            return Err(CoreError::forbidden("Only the buyer of an order can file a complaint"));
        }

        let complaint = Complaint::new(request, &order);
        self.complaints.insert_complaint(&complaint).await?;

        tracing::info!(
            "Complaint {} filed on order {} ({}, {})",
            complaint.id, order.order_number, complaint.category, complaint.priority
        );
        self.publish(&complaint, EventPayload::ComplaintFiled {
            complaint_id: complaint.id,
            category: complaint.category.to_string(),
        });

        Ok(complaint)
    }

    /// Seller or admin only
    pub async fn update_complaint(
        &self,
        identity: &Identity,
        id: Uuid,
        patch: ComplaintPatch,
    ) -> CoreResult<Complaint> {
        if patch.is_empty() {
            return Err(CoreError::validation("Nothing to update"));
        }

        let mut complaint = self.load(id).await?;
        if !identity.is_self_or_admin(complaint.seller_id) {
            return Err(CoreError::forbidden("Only the seller or an admin can update a complaint"));
        }

        let previous = complaint.status;
        complaint.apply(patch)?;

        // Guarded on the status we validated against, so a concurrent close wins
        if !self.complaints.update_complaint(&complaint, previous).await? {
            return Err(match self.complaints.get_complaint(id).await? {
                Some(current) => CoreError::conflict(format!(
                    "Complaint {} moved to {} while it was being updated",
                    id, current.status
                )),
                None => CoreError::not_found("Complaint", id),
            });
        }

        if complaint.status != previous {
            tracing::info!("Complaint {} moved from {} to {}", id, previous, complaint.status);
            self.publish(&complaint, EventPayload::ComplaintUpdated {
                complaint_id: id,
                status: complaint.status.to_string(),
            });
        }

        Ok(complaint)
    }

    /// Admin, or the buyer who filed it
    pub async fn delete_complaint(&self, identity: &Identity, id: Uuid) -> CoreResult<()> {
        let complaint = self.load(id).await?;
        if !identity.is_self_or_admin(complaint.buyer_id) {
            return Err(CoreError::forbidden("Only the filing buyer or an admin can delete a complaint"));
        }

        if !self.complaints.delete_complaint(id).await? {
            return Err(CoreError::not_found("Complaint", id));
        }
        tracing::info!("Complaint {} deleted by {}", id, identity.user_id);
        Ok(())
    }

    pub async fn get_complaint(&self, identity: &Identity, id: Uuid) -> CoreResult<Complaint> {
        let complaint = self.load(id).await?;
        if identity.is_admin()
            || identity.user_id == complaint.buyer_id
            || identity.user_id == complaint.seller_id
        {
            Ok(complaint)
        } else {
            Err(CoreError::forbidden("Complaint belongs to other parties"))
        }
    }

    pub async fn complaints_for_buyer(&self, identity: &Identity) -> CoreResult<Vec<Complaint>> {
        self.complaints.list_complaints_by_buyer(identity.user_id).await
    }

    pub async fn complaints_for_seller(&self, identity: &Identity) -> CoreResult<Vec<Complaint>> {
        self.complaints.list_complaints_by_seller(identity.user_id).await
    }

    pub async fn list_complaints(&self, identity: &Identity) -> CoreResult<Vec<Complaint>> {
        if !identity.is_admin() {
            return Err(CoreError::forbidden("Only admins can list all complaints"));
        }
        self.complaints.list_complaints().await
    }

    async fn load(&self, id: Uuid) -> CoreResult<Complaint> {
        self.complaints.get_complaint(id).await?
            .ok_or_else(|| CoreError::not_found("Complaint", id))
    }

    fn publish(&self, complaint: &Complaint, payload: EventPayload) {
        self.events.publish(MarketEvent::new(
            complaint.order_id,
            complaint.buyer_id,
            complaint.seller_id,
            payload,
        ));
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Notification emitted by the order core for downstream consumers
/// (notification feed, reporting).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct MarketEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    OrderPlaced {
        order_number: String,
        total_amount: Decimal,
    },
    OrderStatusChanged {
        from: String,
        to: String,
    },
    PaymentSettled {
        payment_id: Uuid,
        status: String,
        transaction_id: Option<String>,
    },
    PaymentRefunded {
        payment_id: Uuid,
        reason: Option<String>,
    },
    ComplaintFiled {
        complaint_id: Uuid,
        category: String,
    },
    ComplaintUpdated {
        complaint_id: Uuid,
        status: String,
    },
}

impl MarketEvent {
    pub fn new(order_id: Uuid, buyer_id: Uuid, seller_id: Uuid, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            buyer_id,
            seller_id,
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// Whether the user is one of the two parties of the underlying order
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// Short name used as the SSE event type
    pub fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::OrderPlaced { .. } => "order_placed",
            EventPayload::OrderStatusChanged { .. } => "order_status_changed",
            EventPayload::PaymentSettled { .. } => "payment_settled",
            EventPayload::PaymentRefunded { .. } => "payment_refunded",
            EventPayload::ComplaintFiled { .. } => "complaint_filed",
            EventPayload::ComplaintUpdated { .. } => "complaint_updated",
        }
    }
}

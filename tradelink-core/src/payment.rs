use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A settlement request handed to the payment gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_details: Option<serde_json::Value>,
}

/// Result of a settlement attempt that reached the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayOutcome {
    Approved { transaction_id: Option<String> },
    Declined { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
    #[error("Gateway rejected request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Settle a payment. A decline is a valid outcome, not an error.
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayOutcome, GatewayError>;

    /// Return a previously settled amount to the buyer
    async fn refund(
        &self,
        payment_id: Uuid,
        transaction_id: Option<&str>,
        amount: Decimal,
    ) -> Result<(), GatewayError>;
}

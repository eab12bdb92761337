use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use tradelink_core::payment::{ChargeRequest, GatewayError, GatewayOutcome, PaymentGateway};
use uuid::Uuid;

/// Settlement stand-in: approves each charge with a fixed probability.
/// Refunds always go through.
pub struct SimulatedGateway {
    success_rate: f64,
}

impl SimulatedGateway {
    pub fn new(success_rate: f64) -> Self {
        let success_rate = if success_rate.is_nan() { 0.0 } else { success_rate.clamp(0.0, 1.0) };
        Self { success_rate }
    }

    pub fn always_approve() -> Self {
        Self::new(1.0)
    }

    pub fn always_decline() -> Self {
        Self::new(0.0)
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(0.9)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayOutcome, GatewayError> {
        let approved = rand::thread_rng().gen_bool(self.success_rate);

        if approved {
            tracing::debug!("Simulated gateway approved payment {} ({})", request.payment_id, request.amount);
            // Let the processor assign a transaction id
            Ok(GatewayOutcome::Approved { transaction_id: None })
        } else {
            tracing::debug!("Simulated gateway declined payment {}", request.payment_id);
            Ok(GatewayOutcome::Declined {
                reason: "Payment declined by gateway".to_string(),
            })
        }
    }

    async fn refund(
        &self,
        payment_id: Uuid,
        _transaction_id: Option<&str>,
        amount: Decimal,
    ) -> Result<(), GatewayError> {
        tracing::debug!("Simulated gateway refunded {} for payment {}", amount, payment_id);
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use tradelink_core::{CoreError, CoreResult};
use tradelink_order::repository::PaymentRepository;
use tradelink_order::{OrderPaymentStatus, Payment, PaymentStatus};
use uuid::Uuid;

use crate::{db_error, stored};

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAYMENT_COLUMNS: &str = "id, order_id, amount, payment_method, status, transaction_id, \
     payment_details, refund_reason, processed_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    amount: Decimal,
    payment_method: String,
    status: String,
    transaction_id: Option<String>,
    payment_details: Option<Value>,
    refund_reason: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            status: stored(&row.status)?,
            id: row.id,
            order_id: row.order_id,
            amount: row.amount,
            payment_method: row.payment_method,
            transaction_id: row.transaction_id,
            payment_details: row.payment_details,
            refund_reason: row.refund_reason,
            processed_at: row.processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, amount, payment_method, status, transaction_id,
                                  payment_details, refund_reason, processed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.amount)
        .bind(&payment.payment_method)
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(&payment.payment_details)
        .bind(&payment.refund_reason)
        .bind(payment.processed_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match db_error("insert payment", e) {
            // payments_order_id_key
            CoreError::Conflict(_) => CoreError::conflict(format!(
                "A payment already exists for order {}",
                payment.order_id
            )),
            other => other,
        })?;

        Ok(())
    }

    async fn get_payment(&self, id: Uuid) -> CoreResult<Option<Payment>> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("fetch payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn find_by_order(&self, order_id: Uuid) -> CoreResult<Option<Payment>> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {} FROM payments WHERE order_id = $1", PAYMENT_COLUMNS))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("fetch order payment", e))?;

        row.map(Payment::try_from).transpose()
    }

    async fn claim_for_processing(&self, id: Uuid, stale_before: DateTime<Utc>) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $1, processed_at = NULL, updated_at = NOW()
            WHERE id = $2
              AND (status IN ($3, $4) OR (status = $1 AND updated_at < $5))
            "#,
        )
        .bind(PaymentStatus::Processing.as_str())
        .bind(id)
        .bind(PaymentStatus::Pending.as_str())
        .bind(PaymentStatus::Failed.as_str())
        .bind(stale_before)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("claim payment", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_settlement(
        &self,
        payment: &Payment,
        expected: PaymentStatus,
        order_status: Option<OrderPaymentStatus>,
    ) -> CoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("begin settlement", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = $1, transaction_id = $2, payment_details = $3, refund_reason = $4,
                processed_at = $5, updated_at = $6
            WHERE id = $7 AND status = $8
            "#,
        )
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(&payment.payment_details)
        .bind(&payment.refund_reason)
        .bind(payment.processed_at)
        .bind(payment.updated_at)
        .bind(payment.id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("record settlement", e))?;

        if updated.rows_affected() != 1 {
            // dropping the transaction rolls it back
            return Ok(false);
        }

        if let Some(status) = order_status {
            sqlx::query("UPDATE orders SET payment_status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status.as_str())
                .bind(payment.order_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("sync order payment status", e))?;
        }

        tx.commit().await.map_err(|e| db_error("commit settlement", e))?;
        Ok(true)
    }
}

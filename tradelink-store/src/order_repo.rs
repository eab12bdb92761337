use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use tradelink_core::{CoreError, CoreResult};
use tradelink_order::models::ShippingAddress;
use tradelink_order::repository::OrderRepository;
use tradelink_order::{Order, OrderPaymentStatus, OrderStatus};
use uuid::Uuid;

use crate::{db_error, stored};

pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "id, order_number, product_id, buyer_id, seller_id, quantity, unit_price, \
     total_amount, shipping_address, payment_method, notes, status, payment_status, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct OrderRow {
    id: Uuid,
    order_number: String,
    product_id: Uuid,
    buyer_id: Uuid,
    seller_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    total_amount: Decimal,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    notes: Option<String>,
    status: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            status: stored(&row.status)?,
            payment_status: stored(&row.payment_status)?,
            id: row.id,
            order_number: row.order_number,
            product_id: row.product_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_amount: row.total_amount,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> CoreResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn insert_order(&self, order: &Order) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, product_id, buyer_id, seller_id, quantity, unit_price,
                                total_amount, shipping_address, payment_method, notes, status, payment_status,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.product_id)
        .bind(order.buyer_id)
        .bind(order.seller_id)
        .bind(order.quantity)
        .bind(order.unit_price)
        .bind(order.total_amount)
        .bind(Json(&order.shipping_address))
        .bind(&order.payment_method)
        .bind(&order.notes)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match db_error("insert order", e) {
            CoreError::Conflict(_) => {
                CoreError::conflict(format!("Order number {} already exists", order.order_number))
            }
            other => other,
        })?;

        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("fetch order", e))?;

        row.map(Order::try_from).transpose()
    }

    async fn list_orders(&self) -> CoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("list orders", e))?;

        into_orders(rows)
    }

    async fn list_orders_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list buyer orders", e))?;

        into_orders(rows)
    }

    async fn list_orders_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE seller_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list seller orders", e))?;

        into_orders(rows)
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update order status", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_payment_status(&self, id: Uuid, status: OrderPaymentStatus) -> CoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update order payment status", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_order(&self, id: Uuid) -> CoreResult<bool> {
        // payments and complaints go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete order", e))?;

        Ok(result.rows_affected() == 1)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use tradelink_core::{CoreError, CoreResult};
use tradelink_order::repository::ComplaintRepository;
use tradelink_order::models::ComplaintStatus;
use tradelink_order::Complaint;
use uuid::Uuid;

use crate::{db_error, stored};

pub struct StoreComplaintRepository {
    pool: PgPool,
}

impl StoreComplaintRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COMPLAINT_COLUMNS: &str = "id, order_id, buyer_id, seller_id, subject, description, category, \
     priority, status, resolution, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ComplaintRow {
    id: Uuid,
    order_id: Uuid,
    buyer_id: Uuid,
    seller_id: Uuid,
    subject: String,
    description: String,
    category: String,
    priority: String,
    status: String,
    resolution: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ComplaintRow> for Complaint {
    type Error = CoreError;

    fn try_from(row: ComplaintRow) -> Result<Self, Self::Error> {
        Ok(Complaint {
            category: stored(&row.category)?,
            priority: stored(&row.priority)?,
            status: stored(&row.status)?,
            id: row.id,
            order_id: row.order_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            subject: row.subject,
            description: row.description,
            resolution: row.resolution,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl StoreComplaintRepository {
    async fn fetch_where(&self, filter: &str, id: Option<Uuid>) -> CoreResult<Vec<Complaint>> {
        let sql = format!(
            "SELECT {} FROM complaints {} ORDER BY created_at DESC",
            COMPLAINT_COLUMNS, filter
        );
        let mut query = sqlx::query_as::<Postgres, ComplaintRow>(&sql);
        if let Some(id) = id {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list complaints", e))?;

        rows.into_iter().map(Complaint::try_from).collect()
    }
}

#[async_trait]
impl ComplaintRepository for StoreComplaintRepository {
    async fn insert_complaint(&self, complaint: &Complaint) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO complaints (id, order_id, buyer_id, seller_id, subject, description, category,
                                    priority, status, resolution, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(complaint.id)
        .bind(complaint.order_id)
        .bind(complaint.buyer_id)
        .bind(complaint.seller_id)
        .bind(&complaint.subject)
        .bind(&complaint.description)
        .bind(complaint.category.as_str())
        .bind(complaint.priority.as_str())
        .bind(complaint.status.as_str())
        .bind(&complaint.resolution)
        .bind(complaint.created_at)
        .bind(complaint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert complaint", e))?;

        Ok(())
    }

    async fn get_complaint(&self, id: Uuid) -> CoreResult<Option<Complaint>> {
        let row: Option<ComplaintRow> =
            sqlx::query_as(&format!("SELECT {} FROM complaints WHERE id = $1", COMPLAINT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("fetch complaint", e))?;

        row.map(Complaint::try_from).transpose()
    }

    async fn list_complaints(&self) -> CoreResult<Vec<Complaint>> {
        self.fetch_where("", None).await
    }

    async fn list_complaints_by_buyer(&self, buyer_id: Uuid) -> CoreResult<Vec<Complaint>> {
        self.fetch_where("WHERE buyer_id = $1", Some(buyer_id)).await
    }

    async fn list_complaints_by_seller(&self, seller_id: Uuid) -> CoreResult<Vec<Complaint>> {
        self.fetch_where("WHERE seller_id = $1", Some(seller_id)).await
    }

    async fn update_complaint(&self, complaint: &Complaint, expected: ComplaintStatus) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE complaints
            SET status = $1, resolution = $2, priority = $3, updated_at = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(complaint.status.as_str())
        .bind(&complaint.resolution)
        .bind(complaint.priority.as_str())
        .bind(complaint.updated_at)
        .bind(complaint.id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update complaint", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_complaint(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM complaints WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete complaint", e))?;

        Ok(result.rows_affected() == 1)
    }
}

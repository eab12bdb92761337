use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tradelink_core::{CatalogLookup, CoreResult, ProductSnapshot};
use uuid::Uuid;

use crate::db_error;

/// Read-only view of the catalog's `products` table
pub struct StoreCatalogLookup {
    pool: PgPool,
}

impl StoreCatalogLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    seller_id: Uuid,
    name: String,
    price: Decimal,
    stock_quantity: i32,
}

impl From<ProductRow> for ProductSnapshot {
    fn from(row: ProductRow) -> Self {
        ProductSnapshot {
            id: row.id,
            seller_id: row.seller_id,
            name: row.name,
            price: row.price,
            available_quantity: row.stock_quantity,
        }
    }
}

#[async_trait]
impl CatalogLookup for StoreCatalogLookup {
    async fn find_product(&self, product_id: Uuid) -> CoreResult<Option<ProductSnapshot>> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT id, seller_id, name, price, stock_quantity FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch product", e))?;

        Ok(row.map(ProductSnapshot::from))
    }
}

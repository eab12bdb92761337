use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

/// What the order core needs to know about a catalog product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub available_quantity: i32,
}

/// Read-only access to the product catalog, owned by another service
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolve a product id; `Ok(None)` when the product does not exist
    async fn find_product(&self, product_id: Uuid) -> CoreResult<Option<ProductSnapshot>>;
}

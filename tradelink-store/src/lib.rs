pub mod app_config;
pub mod database;
pub mod order_repo;
pub mod payment_repo;
pub mod complaint_repo;
pub mod catalog_repo;
pub mod events;

pub use app_config::Config;
pub use database::DbClient;
pub use order_repo::StoreOrderRepository;
pub use payment_repo::StorePaymentRepository;
pub use complaint_repo::StoreComplaintRepository;
pub use catalog_repo::StoreCatalogLookup;
pub use events::EventBus;

use tradelink_core::{CoreError, CoreResult};

/// Unique violations become `Conflict`; everything else is internal
pub(crate) fn db_error(context: &str, err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return CoreError::conflict(format!("{}: duplicate record", context));
        }
    }
    tracing::error!("{}: {}", context, err);
    CoreError::internal(format!("{} failed", context))
}

/// Parse a status column; an unknown value is corrupt data, not bad input
pub(crate) fn stored<T>(value: &str) -> CoreResult<T>
where
    T: std::str::FromStr<Err = CoreError>,
{
    value.parse().map_err(|e| {
        tracing::error!("Unreadable status column: {}", e);
        CoreError::internal("Stored record has an unknown status")
    })
}

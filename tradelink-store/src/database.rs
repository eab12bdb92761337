use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use serde_json::Value;

use crate::app_config::{BusinessRules, DatabaseConfig};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay rules stored in the `business_rules` table on top of the
    /// file/env configuration. Rows look like `{"value": <json>}`.
    pub async fn fetch_business_rules(&self, defaults: BusinessRules) -> Result<BusinessRules, sqlx::Error> {
        #[derive(sqlx::FromRow)]
        struct RuleRow {
            rule_key: String,
            rule_value: Value,
        }

        let rows: Vec<RuleRow> = sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for row in rows {
            if let Some(v) = row.rule_value.get("value") {
                apply_rule(&mut rules, &row.rule_key, v);
            }
        }

        Ok(rules)
    }

    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }
}

fn apply_rule(rules: &mut BusinessRules, key: &str, value: &Value) {
    match key {
        "price_policy" => match serde_json::from_value(value.clone()) {
            Ok(policy) => rules.price_policy = policy,
            Err(e) => warn!("Ignoring business rule price_policy={}: {}", value, e),
        },
        "enforce_stock" => {
            if let Some(b) = value.as_bool() {
                rules.enforce_stock = b;
            }
        }
        "payment_success_rate" => {
            if let Some(f) = value.as_f64() {
                rules.payment_success_rate = f.clamp(0.0, 1.0);
            }
        }
        other => warn!("Unknown business rule {}", other),
    }
}

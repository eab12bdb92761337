use serde::Deserialize;
use std::env;
use tradelink_order::{OrderPolicy, PricePolicy};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Apply pending migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default)]
    pub price_policy: PricePolicy,
    #[serde(default = "default_true")]
    pub enforce_stock: bool,
    #[serde(default = "default_success_rate")]
    pub payment_success_rate: f64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            price_policy: PricePolicy::Catalog,
            enforce_stock: true,
            payment_success_rate: default_success_rate(),
        }
    }
}

impl BusinessRules {
    pub fn order_policy(&self) -> OrderPolicy {
        OrderPolicy {
            price: self.price_policy,
            enforce_stock: self.enforce_stock,
        }
    }
}

fn default_true() -> bool { true }
fn default_success_rate() -> f64 { 0.9 }

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { channel_capacity: default_channel_capacity() }
    }
}

fn default_channel_capacity() -> usize { 256 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TRADELINK__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("TRADELINK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

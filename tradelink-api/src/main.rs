use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tradelink_api::{app, AppState, AuthConfig, Repositories};
use tradelink_order::SimulatedGateway;
use tradelink_store::{
    Config, DbClient, EventBus, StoreCatalogLookup, StoreComplaintRepository,
    StoreOrderRepository, StorePaymentRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradelink_api=debug,tradelink_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tradelink API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    if config.database.run_migrations {
        db.migrate().await.context("Failed to run migrations")?;
    }

    let rules = match db.fetch_business_rules(config.business_rules.clone()).await {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!("Using configured business rules, database overrides unavailable: {}", e);
            config.business_rules.clone()
        }
    };
    tracing::info!(
        "Business rules: price policy {:?}, enforce stock {}, payment success rate {}",
        rules.price_policy, rules.enforce_stock, rules.payment_success_rate
    );

    let repos = Repositories {
        orders: Arc::new(StoreOrderRepository::new(db.pool.clone())),
        payments: Arc::new(StorePaymentRepository::new(db.pool.clone())),
        complaints: Arc::new(StoreComplaintRepository::new(db.pool.clone())),
        catalog: Arc::new(StoreCatalogLookup::new(db.pool.clone())),
    };

    let app_state = AppState::new(
        repos,
        Arc::new(SimulatedGateway::new(rules.payment_success_rate)),
        rules.order_policy(),
        EventBus::new(config.events.channel_capacity),
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

//! Food order engine HTTP server

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use food_order_engine::api::{self, AppState};
use food_order_engine::application::{EventPublisher, OrderRepository, PromotionCatalog};
use food_order_engine::infrastructure::{
    InMemoryOrderRepository, InMemoryPromotionCatalog, NatsPublisher, PgOrderRepository, PgPromotionCatalog, TracingPublisher,
};
use food_order_engine::{Config, OrderLifecycleService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (orders, promotions): (Arc<dyn OrderRepository>, Arc<dyn PromotionCatalog>) = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            tracing::info!("using PostgreSQL storage");
            (Arc::new(PgOrderRepository::new(db.clone())), Arc::new(PgPromotionCatalog::new(db)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory only");
            (Arc::new(InMemoryOrderRepository::default()), Arc::new(InMemoryPromotionCatalog::default()))
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, config.nats_subject_prefix.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, logging order events instead");
                Arc::new(TracingPublisher)
            }
        },
        None => Arc::new(TracingPublisher),
    };

    let service = OrderLifecycleService::new(orders, promotions)
        .with_publisher(events)
        .with_rates(config.shipping.clone())
        .with_max_retries(config.max_update_retries);
    let app = api::router(AppState { service });

    let addr = config.bind_address();
    tracing::info!("🚀 Food order engine listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}

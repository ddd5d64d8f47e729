//! Bookstore Orders - order lifecycle service

use anyhow::Result;
use bookstore_orders::config::Config;
use bookstore_orders::gateway::ZarinpalClient;
use bookstore_orders::http::{self, AppState, TokenKeys};
use bookstore_orders::publisher::EventPublisher;
use bookstore_orders::store::{MemoryStore, OrderStore, PgStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let store: Arc<dyn OrderStore> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.db_max_connections).acquire_timeout(Duration::from_secs(5)).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, order events will not be published");
                None
            }
        },
        None => None,
    };

    let gateway = Arc::new(ZarinpalClient::new(&config.zarinpal_merchant_id, config.zarinpal_sandbox, config.gateway_timeout)?);
    let tokens = TokenKeys::new(config.jwt_secret.as_bytes(), chrono::Duration::minutes(config.access_token_ttl_mins));
    let state = AppState::new(store, gateway, EventPublisher::new(nats), tokens, config.callback_url());
    let app = http::router(state, config.request_timeout);

    tracing::info!("Bookstore orders listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}

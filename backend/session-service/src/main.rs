/// Session Service Main Entry Point
///
/// Connects the PostgreSQL pool and Redis connection manager and runs the
/// revocation-registry maintenance sweeper. The request surface lives in the
/// gateway; this binary owns the background side of the subsystem.
use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use session_service::{
    config::Settings,
    services::RevocationRegistry,
    store::{PgRevocationStore, RedisRevocationCache},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "session_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    let settings = Settings::load().context("Failed to load settings")?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL");

    let redis_client = redis::Client::open(settings.redis.url.as_str())
        .context("Failed to construct Redis client")?;
    let redis = Arc::new(Mutex::new(
        ConnectionManager::new(redis_client)
            .await
            .context("Failed to initialize Redis connection manager")?,
    ));
    info!("Connected to Redis");

    let store_timeout = settings.policy.store_timeout();
    let registry = Arc::new(RevocationRegistry::new(
        Arc::new(RedisRevocationCache::new(redis.clone(), store_timeout)),
        Arc::new(PgRevocationStore::new(pool.clone(), store_timeout)),
    ));

    // Durable revocation records are garbage once the tokens they block have
    // expired on their own; sweep them periodically off the request path.
    let sweep_interval =
        Duration::from_secs(settings.maintenance.revocation_sweep_interval_secs);
    let sweeper = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(err) = sweeper.purge_expired().await {
                error!(error = %err, "revocation sweep failed");
            }
        }
    });

    info!("session-service started");

    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("session-service shutting down");
    Ok(())
}

//! Standalone unit worker.
//!
//! Pulls units from the Redis broker shared with `relay-api` (started with
//! `EMBEDDED_WORKER=false`) and writes progress to the same status store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use relay_jobs::{
    Broker, ChainCatalog, ChainCoordinator, DispatchStore, RedisDispatchStore, RedisListBroker,
    UnitRegistry, Worker, WorkerConfig,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    relay_observability::init();

    let redis_url = std::env::var("REDIS_URL").context("REDIS_URL must be set for relay-worker")?;
    let status_ttl = match std::env::var("STATUS_TTL_SECS") {
        Ok(raw) => Duration::from_secs(
            raw.trim()
                .parse()
                .with_context(|| format!("invalid value `{raw}` for STATUS_TTL_SECS"))?,
        ),
        Err(_) => Duration::from_secs(3600),
    };
    let config = WorkerConfig::from_env()?;

    let broker: Arc<dyn Broker> = Arc::new(RedisListBroker::new(&redis_url, None)?);
    let store: Arc<dyn DispatchStore> = Arc::new(RedisDispatchStore::new(&redis_url, status_ttl)?);
    let coordinator = Arc::new(ChainCoordinator::new(
        broker.clone(),
        store.clone(),
        ChainCatalog::standard(),
    ));
    let registry = Arc::new(UnitRegistry::standard(config.latency));

    tracing::info!(
        workers = config.count,
        units = ?registry.names(),
        "starting relay-worker"
    );
    let handles = Worker::new(broker, store, coordinator, registry, config).spawn_pool()?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested; waiting for in-flight units");

    tokio::task::spawn_blocking(move || {
        for handle in handles {
            let stats = handle.stats();
            tracing::info!(
                worker = %handle.name(),
                processed = stats.units_processed,
                failed = stats.units_failed,
                dead_lettered = stats.units_dead_lettered,
                "worker stopping"
            );
            handle.shutdown();
        }
    })
    .await?;
    Ok(())
}

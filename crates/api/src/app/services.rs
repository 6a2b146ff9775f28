//! Collaborator wiring: broker, status store, KV store and chain coordinator.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use relay_cache::{CacheError, InMemoryKvStore, KvStore};
use relay_jobs::{
    Broker, BrokerError, ChainCatalog, ChainCoordinator, DispatchStore, InMemoryBroker,
    InMemoryDispatchStore, LatencyProfile, StoreError, UnitRegistry, Worker, WorkerConfig,
    WorkerHandle,
};

use crate::config::AppConfig;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("REDIS_URL is set but this build has no `redis` feature")]
    RedisDisabled,
    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

type Collaborators = (Arc<dyn Broker>, Arc<dyn DispatchStore>, Arc<dyn KvStore>);

/// Shared services handed to every handler.
pub struct AppServices {
    pub broker: Arc<dyn Broker>,
    pub store: Arc<dyn DispatchStore>,
    pub coordinator: Arc<ChainCoordinator>,
    pub registry: Arc<UnitRegistry>,
    pub kv: Arc<dyn KvStore>,
    pub svg_cache_ttl: Duration,
}

impl AppServices {
    /// Everything in process memory, with the standard units at `latency`.
    pub fn in_memory(latency: LatencyProfile) -> Self {
        Self::assemble(
            (
                Arc::new(InMemoryBroker::new()) as Arc<dyn Broker>,
                Arc::new(InMemoryDispatchStore::new()) as Arc<dyn DispatchStore>,
                Arc::new(InMemoryKvStore::new()) as Arc<dyn KvStore>,
            ),
            latency,
            Duration::from_secs(3600),
        )
    }

    /// Redis collaborators when `REDIS_URL` is set, in-memory ones otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let collaborators = match &config.redis_url {
            Some(url) => redis_collaborators(url, config.status_ttl)?,
            None => {
                info!("REDIS_URL not set; using in-memory broker, status store and cache");
                (
                    Arc::new(InMemoryBroker::new()) as Arc<dyn Broker>,
                    Arc::new(InMemoryDispatchStore::with_ttl(config.status_ttl)) as Arc<dyn DispatchStore>,
                    Arc::new(InMemoryKvStore::new()) as Arc<dyn KvStore>,
                )
            }
        };
        Ok(Self::assemble(
            collaborators,
            config.worker.latency,
            config.svg_cache_ttl,
        ))
    }

    fn assemble((broker, store, kv): Collaborators, latency: LatencyProfile, svg_cache_ttl: Duration) -> Self {
        let coordinator = Arc::new(ChainCoordinator::new(
            broker.clone(),
            store.clone(),
            ChainCatalog::standard(),
        ));
        Self {
            broker,
            store,
            coordinator,
            registry: Arc::new(UnitRegistry::standard(latency)),
            kv,
            svg_cache_ttl,
        }
    }

    pub fn worker(&self, config: WorkerConfig) -> Worker {
        Worker::new(
            self.broker.clone(),
            self.store.clone(),
            self.coordinator.clone(),
            self.registry.clone(),
            config,
        )
    }

    /// Start `config.count` workers sharing these collaborators.
    pub fn start_workers(&self, config: WorkerConfig) -> Result<Vec<WorkerHandle>, StartupError> {
        let handles = self.worker(config).spawn_pool()?;
        info!(workers = handles.len(), "embedded workers started");
        Ok(handles)
    }
}

#[cfg(feature = "redis")]
fn redis_collaborators(url: &str, status_ttl: Duration) -> Result<Collaborators, StartupError> {
    use relay_cache::RedisKvStore;
    use relay_jobs::{RedisDispatchStore, RedisListBroker};

    info!("using redis broker, status store and cache");
    let broker: Arc<dyn Broker> = Arc::new(RedisListBroker::new(url, None)?);
    let store: Arc<dyn DispatchStore> = Arc::new(RedisDispatchStore::new(url, status_ttl)?);
    let kv: Arc<dyn KvStore> = Arc::new(RedisKvStore::new(url)?);
    Ok((broker, store, kv))
}

#[cfg(not(feature = "redis"))]
fn redis_collaborators(_url: &str, _status_ttl: Duration) -> Result<Collaborators, StartupError> {
    Err(StartupError::RedisDisabled)
}

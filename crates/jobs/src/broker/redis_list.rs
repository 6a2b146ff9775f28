//! Redis list-backed broker (RPUSH / BLPOP).
//!
//! - **Queue Key**: `relay:units` (single FIFO list shared by all workers)
//! - **Payload**: JSON-encoded [`UnitEnvelope`]
//!
//! Delivery is at-most-once per pop; redelivery after a worker crash is not
//! attempted.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use relay_core::TaskId;

use super::{Broker, BrokerError};
use crate::types::UnitEnvelope;

/// Default list key for queued units
const DEFAULT_QUEUE_KEY: &str = "relay:units";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RedisListBroker {
    client: Arc<redis::Client>,
    queue_key: String,
}

impl RedisListBroker {
    /// Create a new broker.
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `queue_key` - list key (default: "relay:units")
    pub fn new(redis_url: impl AsRef<str>, queue_key: Option<String>) -> Result<Self, BrokerError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            queue_key: queue_key.unwrap_or_else(|| DEFAULT_QUEUE_KEY.to_string()),
        })
    }

    fn connection(&self) -> Result<redis::Connection, BrokerError> {
        self.client
            .get_connection_with_timeout(CONNECT_TIMEOUT)
            .map_err(|e| BrokerError::Connection(e.to_string()))
    }
}

impl Broker for RedisListBroker {
    #[instrument(
        skip(self, envelope),
        fields(
            queue_key = %self.queue_key,
            correlation_id = %envelope.correlation_id,
            unit = %envelope.unit
        ),
        err
    )]
    fn enqueue(&self, envelope: UnitEnvelope) -> Result<TaskId, BrokerError> {
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| BrokerError::Serialization(e.to_string()))?;

        let mut conn = self.connection()?;
        let _: u64 = redis::cmd("RPUSH")
            .arg(&self.queue_key)
            .arg(&payload)
            .query(&mut conn)
            .map_err(|e| BrokerError::Command(format!("RPUSH failed: {e}")))?;

        Ok(envelope.task_id)
    }

    fn dequeue(&self, timeout: Duration) -> Result<Option<UnitEnvelope>, BrokerError> {
        let mut conn = self.connection()?;

        // BLPOP treats 0 as "block forever"; keep a floor so shutdown stays responsive.
        let secs = timeout.as_secs_f64().max(0.01);
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.queue_key)
            .arg(secs)
            .query(&mut conn)
            .map_err(|e| BrokerError::Command(format!("BLPOP failed: {e}")))?;

        match popped {
            Some((_key, payload)) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| BrokerError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn pending(&self) -> Result<usize, BrokerError> {
        let mut conn = self.connection()?;
        redis::cmd("LLEN")
            .arg(&self.queue_key)
            .query(&mut conn)
            .map_err(|e| BrokerError::Command(format!("LLEN failed: {e}")))
    }
}

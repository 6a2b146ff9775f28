//! Task broker abstraction (mechanics only).
//!
//! The broker is the transport between the coordinator, which enqueues units,
//! and the workers, which pull and execute them.
//!
//! - **At-least-once** where the implementation can offer it: units must tolerate
//!   being delivered more than once
//! - **FIFO per queue**: units are delivered in enqueue order
//! - **No persistence assumptions**: durability is up to the implementation

use std::sync::Arc;
use std::time::Duration;

use relay_core::TaskId;

use crate::types::UnitEnvelope;

mod in_memory;
#[cfg(feature = "redis")]
mod redis_list;

pub use in_memory::InMemoryBroker;
#[cfg(feature = "redis")]
pub use redis_list::RedisListBroker;

/// Broker error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),
    #[error("broker command error: {0}")]
    Command(String),
    #[error("envelope serialization error: {0}")]
    Serialization(String),
    /// Publish failed due to internal lock poisoning.
    #[error("broker state poisoned")]
    Poisoned,
}

/// Queue of units waiting for a worker.
pub trait Broker: Send + Sync {
    /// Append a unit to the queue and return its task id.
    fn enqueue(&self, envelope: UnitEnvelope) -> Result<TaskId, BrokerError>;

    /// Pop the oldest unit, waiting up to `timeout` for one to arrive.
    fn dequeue(&self, timeout: Duration) -> Result<Option<UnitEnvelope>, BrokerError>;

    /// Number of units waiting.
    fn pending(&self) -> Result<usize, BrokerError>;
}

impl<B> Broker for Arc<B>
where
    B: Broker + ?Sized,
{
    fn enqueue(&self, envelope: UnitEnvelope) -> Result<TaskId, BrokerError> {
        (**self).enqueue(envelope)
    }

    fn dequeue(&self, timeout: Duration) -> Result<Option<UnitEnvelope>, BrokerError> {
        (**self).dequeue(timeout)
    }

    fn pending(&self) -> Result<usize, BrokerError> {
        (**self).pending()
    }
}

//! In-memory broker for tests/dev.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use relay_core::TaskId;

use super::{Broker, BrokerError};
use crate::types::UnitEnvelope;

/// Process-local FIFO queue.
///
/// - No IO
/// - Blocking `dequeue` wakes as soon as a unit is enqueued
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    queue: Mutex<VecDeque<UnitEnvelope>>,
    ready: Condvar,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the waiting units, oldest first.
    pub fn snapshot(&self) -> Vec<UnitEnvelope> {
        match self.queue.lock() {
            Ok(q) => q.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Broker for InMemoryBroker {
    fn enqueue(&self, envelope: UnitEnvelope) -> Result<TaskId, BrokerError> {
        let task_id = envelope.task_id;
        let mut queue = self.queue.lock().map_err(|_| BrokerError::Poisoned)?;
        queue.push_back(envelope);
        self.ready.notify_one();
        Ok(task_id)
    }

    fn dequeue(&self, timeout: Duration) -> Result<Option<UnitEnvelope>, BrokerError> {
        let queue = self.queue.lock().map_err(|_| BrokerError::Poisoned)?;
        let (mut queue, _) = self
            .ready
            .wait_timeout_while(queue, timeout, |q| q.is_empty())
            .map_err(|_| BrokerError::Poisoned)?;
        Ok(queue.pop_front())
    }

    fn pending(&self) -> Result<usize, BrokerError> {
        Ok(self.queue.lock().map_err(|_| BrokerError::Poisoned)?.len())
    }
}

//! Dispatch status storage.
//!
//! One [`DispatchRecord`] per dispatched chain, keyed by correlation id, plus
//! the dead-letter list fed by workers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::{CorrelationId, JsonMap, TaskId};

use crate::catalog::ChainKind;
use crate::types::DeadLetterEntry;

mod in_memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use in_memory::InMemoryDispatchStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisDispatchStore;

/// Status store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("dispatch not found: {0}")]
    NotFound(CorrelationId),
    #[error("dispatch already exists: {0}")]
    AlreadyExists(CorrelationId),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("record serialization error: {0}")]
    Serialization(String),
}

/// Where a chain currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ChainState {
    /// The unit at `index` sits in the broker.
    Queued { index: usize },
    /// The unit at `index` is executing.
    Running { index: usize },
    Completed,
    Failed {
        index: usize,
        unit: String,
        reason: String,
    },
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChainState::Completed | ChainState::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    NotStarted,
    Queued,
    Running,
    Succeeded,
    Failed,
    /// An earlier unit failed, so this one never ran.
    Skipped,
}

/// Per-unit progress within a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitProgress {
    pub name: String,
    pub task_id: Option<TaskId>,
    pub state: UnitState,
    pub attempts: u32,
    pub output: Option<JsonMap>,
}

impl UnitProgress {
    fn not_started(name: &str) -> Self {
        Self {
            name: name.to_string(),
            task_id: None,
            state: UnitState::NotStarted,
            attempts: 0,
            output: None,
        }
    }
}

/// Status of one dispatched chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub correlation_id: CorrelationId,
    pub kind: ChainKind,
    pub chain: Vec<String>,
    /// Broker task id of the first unit.
    pub task_id: TaskId,
    pub state: ChainState,
    pub units: Vec<UnitProgress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DispatchRecord {
    /// A fresh record with the first unit queued under `task_id`.
    pub fn new(correlation_id: CorrelationId, kind: ChainKind, chain: Vec<String>, task_id: TaskId) -> Self {
        let now = Utc::now();
        let mut units: Vec<UnitProgress> = chain.iter().map(|n| UnitProgress::not_started(n)).collect();
        if let Some(first) = units.first_mut() {
            first.task_id = Some(task_id);
            first.state = UnitState::Queued;
        }
        Self {
            correlation_id,
            kind,
            chain,
            task_id,
            state: ChainState::Queued { index: 0 },
            units,
            created_at: now,
            updated_at: now,
        }
    }

    /// Every `mark_*` is a no-op once the chain is completed or failed.
    pub fn mark_running(&mut self, index: usize, attempt: u32) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(unit) = self.units.get_mut(index) {
            unit.state = UnitState::Running;
            unit.attempts = attempt;
        }
        self.state = ChainState::Running { index };
        self.updated_at = Utc::now();
    }

    /// Record a successful unit; `next` is the task id of the unit queued after it.
    pub fn mark_succeeded(&mut self, index: usize, output: JsonMap, next: Option<TaskId>) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(unit) = self.units.get_mut(index) {
            unit.state = UnitState::Succeeded;
            unit.output = Some(output);
        }
        match next {
            Some(task_id) => {
                if let Some(unit) = self.units.get_mut(index + 1) {
                    unit.state = UnitState::Queued;
                    unit.task_id = Some(task_id);
                }
                self.state = ChainState::Queued { index: index + 1 };
            }
            None => self.state = ChainState::Completed,
        }
        self.updated_at = Utc::now();
    }

    /// Record a failed unit; every later unit is skipped.
    pub fn mark_failed(&mut self, index: usize, reason: String, output: Option<JsonMap>) {
        if self.state.is_terminal() {
            return;
        }
        let unit_name = self.chain.get(index).cloned().unwrap_or_default();
        for (i, unit) in self.units.iter_mut().enumerate() {
            if i == index {
                unit.state = UnitState::Failed;
                unit.output = output.clone();
            } else if i > index {
                unit.state = UnitState::Skipped;
            }
        }
        self.state = ChainState::Failed {
            index,
            unit: unit_name,
            reason,
        };
        self.updated_at = Utc::now();
    }
}

/// Dispatch status store abstraction.
pub trait DispatchStore: Send + Sync {
    /// Store a new record. Fails if the correlation id is already known.
    fn insert(&self, record: DispatchRecord) -> Result<(), StoreError>;

    /// Get a record by correlation id. Expired records read as `None`.
    fn get(&self, correlation_id: CorrelationId) -> Result<Option<DispatchRecord>, StoreError>;

    /// Apply `apply` to the stored record as one atomic read-modify-write and
    /// return the result. Concurrent updates of the same record never lose a write.
    fn update_with(
        &self,
        correlation_id: CorrelationId,
        apply: &mut dyn FnMut(&mut DispatchRecord),
    ) -> Result<DispatchRecord, StoreError>;

    /// Drop a record (used when a dispatch never started).
    fn remove(&self, correlation_id: CorrelationId) -> Result<(), StoreError>;

    /// Append to the dead-letter list.
    fn dead_letter(&self, entry: DeadLetterEntry) -> Result<(), StoreError>;

    /// Newest dead letters first.
    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError>;
}

impl<S> DispatchStore for Arc<S>
where
    S: DispatchStore + ?Sized,
{
    fn insert(&self, record: DispatchRecord) -> Result<(), StoreError> {
        (**self).insert(record)
    }

    fn get(&self, correlation_id: CorrelationId) -> Result<Option<DispatchRecord>, StoreError> {
        (**self).get(correlation_id)
    }

    fn update_with(
        &self,
        correlation_id: CorrelationId,
        apply: &mut dyn FnMut(&mut DispatchRecord),
    ) -> Result<DispatchRecord, StoreError> {
        (**self).update_with(correlation_id, apply)
    }

    fn remove(&self, correlation_id: CorrelationId) -> Result<(), StoreError> {
        (**self).remove(correlation_id)
    }

    fn dead_letter(&self, entry: DeadLetterEntry) -> Result<(), StoreError> {
        (**self).dead_letter(entry)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, StoreError> {
        (**self).list_dead_letters(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_record() -> DispatchRecord {
        DispatchRecord::new(
            CorrelationId::new(),
            ChainKind::Order,
            vec!["step_one".to_string(), "step_two".to_string()],
            TaskId::new(),
        )
    }

    #[test]
    fn new_record_queues_first_unit_only() {
        let record = order_record();
        assert_eq!(record.state, ChainState::Queued { index: 0 });
        assert_eq!(record.units[0].state, UnitState::Queued);
        assert_eq!(record.units[0].task_id, Some(record.task_id));
        assert_eq!(record.units[1].state, UnitState::NotStarted);
    }

    #[test]
    fn success_then_completion() {
        let mut record = order_record();
        let next = TaskId::new();

        record.mark_running(0, 1);
        record.mark_succeeded(0, JsonMap::new(), Some(next));
        assert_eq!(record.state, ChainState::Queued { index: 1 });
        assert_eq!(record.units[1].task_id, Some(next));

        record.mark_running(1, 1);
        record.mark_succeeded(1, JsonMap::new(), None);
        assert_eq!(record.state, ChainState::Completed);
        assert!(record.state.is_terminal());
    }

    #[test]
    fn failure_skips_remaining_units() {
        let mut record = order_record();
        record.mark_failed(0, "boom".to_string(), None);

        assert_eq!(record.units[0].state, UnitState::Failed);
        assert_eq!(record.units[1].state, UnitState::Skipped);
        assert!(matches!(
            &record.state,
            ChainState::Failed { index: 0, unit, reason } if unit == "step_one" && reason == "boom"
        ));
    }

    #[test]
    fn terminal_state_is_never_overwritten() {
        let mut record = order_record();
        record.mark_succeeded(0, JsonMap::new(), Some(TaskId::new()));
        record.mark_succeeded(1, JsonMap::new(), None);
        assert_eq!(record.state, ChainState::Completed);

        record.mark_running(1, 2);
        record.mark_succeeded(0, JsonMap::new(), Some(TaskId::new()));
        record.mark_failed(1, "late".to_string(), None);

        assert_eq!(record.state, ChainState::Completed);
        assert_eq!(record.units[1].state, UnitState::Succeeded);
    }
}

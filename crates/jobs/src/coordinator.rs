//! Chain coordinator: turns a dispatch request into an ordered sequence of
//! unit enqueues and owns the enqueue-next decision.
//!
//! Units never enqueue their successors themselves. A worker reports each
//! outcome through [`ChainCoordinator::on_unit_complete`], which is the only
//! place a chain advances. Progress is written to the status store before the
//! next unit is enqueued, so a worker picking that unit up always sees it.
//! Store writes after dispatch are best-effort: a failure is logged and never
//! blocks progression.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use relay_core::{CorrelationId, JsonMap, TaskId};

use crate::broker::{Broker, BrokerError};
use crate::catalog::{ChainCatalog, ChainKind, InvalidPayload, UnknownChainKind};
use crate::store::{DispatchRecord, DispatchStore, StoreError};
use crate::types::{JobRequest, UnitEnvelope, UnitResult};

/// Errors surfaced synchronously to the caller of a dispatch.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidChainKind(#[from] UnknownChainKind),
    #[error(transparent)]
    InvalidPayload(#[from] InvalidPayload),
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(#[from] BrokerError),
    #[error("status store error: {0}")]
    Store(#[from] StoreError),
}

/// What happened to a chain after one of its units finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The next unit was enqueued.
    Enqueued { unit: String, task_id: TaskId },
    /// The last unit succeeded.
    Completed,
    /// A unit failed; nothing further runs.
    Stopped { reason: String },
}

/// Acknowledgement returned to the client on dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchAck {
    pub message: String,
    pub task_id: TaskId,
    pub correlation_id: CorrelationId,
    #[serde(flatten)]
    pub echoed: JsonMap,
    pub chain: Vec<String>,
}

impl DispatchAck {
    pub fn new(record: &DispatchRecord, payload: &JsonMap) -> Self {
        Self {
            message: record.kind.dispatch_message().to_string(),
            task_id: record.task_id,
            correlation_id: record.correlation_id,
            echoed: record.kind.echo(payload),
            chain: record.chain.clone(),
        }
    }
}

pub struct ChainCoordinator {
    broker: Arc<dyn Broker>,
    store: Arc<dyn DispatchStore>,
    catalog: ChainCatalog,
}

impl ChainCoordinator {
    pub fn new(broker: Arc<dyn Broker>, store: Arc<dyn DispatchStore>, catalog: ChainCatalog) -> Self {
        Self {
            broker,
            store,
            catalog,
        }
    }

    pub fn store(&self) -> &Arc<dyn DispatchStore> {
        &self.store
    }

    /// Resolve a raw kind to its unit list.
    pub fn chain_for(&self, kind: &str) -> Result<(ChainKind, Vec<String>), DispatchError> {
        let kind: ChainKind = kind.parse()?;
        match self.catalog.get(kind) {
            Some(def) if !def.is_empty() => Ok((kind, def.units.clone())),
            _ => Err(UnknownChainKind(kind.to_string()).into()),
        }
    }

    /// Record a new chain and enqueue its first unit.
    ///
    /// Returns as soon as the first unit is in the broker. If the enqueue
    /// fails the record is dropped again and the chain is not considered started.
    #[instrument(skip(self, request), fields(kind = %request.kind))]
    pub fn dispatch_chain(&self, request: JobRequest) -> Result<DispatchRecord, DispatchError> {
        let (kind, chain) = self.chain_for(&request.kind)?;
        kind.validate(&request.payload)?;
        let correlation_id = CorrelationId::new();

        let Some(first) = UnitEnvelope::for_step(correlation_id, &chain, 0, request.payload) else {
            return Err(UnknownChainKind(kind.to_string()).into());
        };

        let record = DispatchRecord::new(correlation_id, kind, chain, first.task_id);
        self.store.insert(record.clone())?;

        if let Err(e) = self.broker.enqueue(first) {
            error!(%correlation_id, error = %e, "failed to enqueue first unit");
            if let Err(store_err) = self.store.remove(correlation_id) {
                warn!(%correlation_id, error = %store_err, "failed to drop unstarted dispatch");
            }
            return Err(e.into());
        }

        info!(
            %correlation_id,
            task_id = %record.task_id,
            chain = ?record.chain,
            "chain dispatched"
        );
        Ok(record)
    }

    /// Mark the unit at `index` as executing.
    pub fn on_unit_started(&self, correlation_id: CorrelationId, index: usize, attempt: u32) {
        self.update_record(correlation_id, |r| r.mark_running(index, attempt));
    }

    /// Decide what follows the unit at `index` of `chain`.
    ///
    /// Success with a successor enqueues `chain[index + 1]` with the unit's
    /// `next_unit_args` (an empty map when it supplied none). Failure stops
    /// the chain.
    #[instrument(skip(self, chain, result), fields(unit = chain.get(index).map(String::as_str).unwrap_or("?")))]
    pub fn on_unit_complete(
        &self,
        correlation_id: CorrelationId,
        chain: &[String],
        index: usize,
        result: &UnitResult,
    ) -> Result<Advance, DispatchError> {
        if let Some(reason) = result.failure_reason() {
            warn!(%correlation_id, index, reason = %reason, "chain stopped");
            self.update_record(correlation_id, |r| {
                r.mark_failed(index, reason.clone(), Some(result.output.clone()))
            });
            return Ok(Advance::Stopped { reason });
        }

        let next_args = result.next_unit_args.clone().unwrap_or_default();
        let Some(next) = UnitEnvelope::for_step(correlation_id, chain, index + 1, next_args) else {
            info!(%correlation_id, "chain completed");
            self.update_record(correlation_id, |r| {
                r.mark_succeeded(index, result.output.clone(), None)
            });
            return Ok(Advance::Completed);
        };

        let unit = next.unit.clone();
        let next_task = next.task_id;
        self.update_record(correlation_id, |r| {
            r.mark_succeeded(index, result.output.clone(), Some(next_task))
        });

        match self.broker.enqueue(next) {
            Ok(task_id) => {
                info!(%correlation_id, next_unit = %unit, %task_id, "chain advanced");
                Ok(Advance::Enqueued { unit, task_id })
            }
            Err(e) => {
                error!(%correlation_id, next_unit = %unit, error = %e, "failed to enqueue next unit");
                let reason = format!("could not enqueue `{unit}`: {e}");
                self.update_record(correlation_id, |r| r.mark_failed(index + 1, reason.clone(), None));
                Err(e.into())
            }
        }
    }

    fn update_record(&self, correlation_id: CorrelationId, mut apply: impl FnMut(&mut DispatchRecord)) {
        if let Err(e) = self.store.update_with(correlation_id, &mut apply) {
            warn!(%correlation_id, error = %e, "dispatch status not updated");
        }
    }
}

//! Job chains: dispatch, broker delivery, unit execution and status tracking.
//!
//! ## Design
//!
//! - A chain is an ordered list of named units; each runs only after the
//!   previous one succeeded
//! - The coordinator owns chain progression; units only report a result
//! - Execution errors are retried per unit, then dead-lettered
//! - Every dispatch has a status record readable by correlation id
//!
//! ## Components
//!
//! - `ChainCoordinator`: dispatches chains and advances them on completion
//! - `Broker`: FIFO delivery of unit envelopes (in-memory or Redis list)
//! - `DispatchStore`: status records and dead letters (in-memory or Redis)
//! - `UnitRegistry`: named unit handlers with retry policies
//! - `Worker`: pulls envelopes and executes them

pub mod broker;
pub mod catalog;
pub mod coordinator;
pub mod registry;
pub mod store;
pub mod types;
pub mod units;
pub mod worker;

pub use broker::{Broker, BrokerError, InMemoryBroker};
#[cfg(feature = "redis")]
pub use broker::RedisListBroker;
pub use catalog::{ChainCatalog, ChainDefinition, ChainKind, InvalidPayload, MAX_REPEAT, UnknownChainKind};
pub use coordinator::{Advance, ChainCoordinator, DispatchAck, DispatchError};
pub use registry::{RegisteredUnit, UnitHandler, UnitRegistry};
pub use store::{
    ChainState, DispatchRecord, DispatchStore, InMemoryDispatchStore, StoreError, UnitProgress,
    UnitState,
};
#[cfg(feature = "redis")]
pub use store::RedisDispatchStore;
pub use types::{
    DeadLetterEntry, JobRequest, RetryPolicy, UnitContext, UnitEnvelope,
    UnitError, UnitResult, UnitStatus,
};
pub use units::LatencyProfile;
pub use worker::{ProcessOutcome, Worker, WorkerConfig, WorkerConfigError, WorkerHandle, WorkerStats};

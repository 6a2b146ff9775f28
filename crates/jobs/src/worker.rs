//! Broker-driven unit worker with retry, timeout and dead-lettering.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::broker::{Broker, BrokerError};
use crate::coordinator::{Advance, ChainCoordinator};
use crate::registry::{UnitHandler, UnitRegistry};
use crate::store::DispatchStore;
use crate::types::{DeadLetterEntry, RetryPolicy, UnitContext, UnitEnvelope, UnitError, UnitResult};
use crate::units::{LatencyProfile, MAX_LATENCY_SCALE};

/// Invalid worker setting read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value `{value}` for {var}")]
pub struct WorkerConfigError {
    pub var: &'static str,
    pub value: String,
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name for logging and thread naming
    pub name: String,
    /// Longest a single dequeue blocks before the shutdown signal is checked
    pub poll_interval: Duration,
    /// Longest a unit may run before it counts as an execution error
    pub unit_timeout: Duration,
    /// Worker threads to start
    pub count: usize,
    pub latency: LatencyProfile,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "relay-worker".to_string(),
            poll_interval: Duration::from_millis(250),
            unit_timeout: Duration::from_secs(30),
            count: 1,
            latency: LatencyProfile::demo(),
        }
    }
}

impl WorkerConfig {
    /// Read `WORKER_POLL_MS`, `UNIT_TIMEOUT_SECS`, `WORKER_COUNT` and
    /// `JOB_LATENCY_SCALE`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, WorkerConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WorkerConfigError> {
        let mut config = Self::default();
        if let Some(ms) = parse_var::<u64>(&lookup, "WORKER_POLL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "UNIT_TIMEOUT_SECS")? {
            config.unit_timeout = Duration::from_secs(secs);
        }
        if let Some(count) = parse_var::<usize>(&lookup, "WORKER_COUNT")? {
            config.count = count;
        }
        let in_range = |scale: &f64| (0.0..=MAX_LATENCY_SCALE).contains(scale);
        if let Some(scale) = parse_checked::<f64>(&lookup, "JOB_LATENCY_SCALE", in_range)? {
            config.latency = LatencyProfile::scaled(scale);
        }
        Ok(config)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = timeout;
        self
    }

    pub fn with_latency(mut self, latency: LatencyProfile) -> Self {
        self.latency = latency;
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, WorkerConfigError> {
    parse_checked(lookup, var, |_| true)
}

fn parse_checked<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    accept: impl Fn(&T) -> bool,
) -> Result<Option<T>, WorkerConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if accept(&value) => Ok(Some(value)),
            _ => Err(WorkerConfigError { var, value: raw }),
        },
    }
}

/// Handle to control a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request graceful shutdown and wait for the in-flight unit to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                error!(worker = %self.name, "worker thread panicked");
            }
        }
    }

    /// Get current worker statistics.
    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkerStats {
    pub units_processed: u64,
    pub units_succeeded: u64,
    pub units_failed: u64,
    pub units_dead_lettered: u64,
    pub retries: u64,
    pub uptime_secs: u64,
}

/// What happened to one envelope.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub result: UnitResult,
    pub attempts: u32,
    pub dead_lettered: bool,
    /// `None` when the coordinator could not advance the chain.
    pub advance: Option<Advance>,
}

/// Pulls unit envelopes from the broker and executes them.
///
/// Business failures are reported as-is. Execution errors are retried per
/// the unit's policy, then dead-lettered and reported as a failure.
#[derive(Clone)]
pub struct Worker {
    broker: Arc<dyn Broker>,
    store: Arc<dyn DispatchStore>,
    coordinator: Arc<ChainCoordinator>,
    registry: Arc<UnitRegistry>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        broker: Arc<dyn Broker>,
        store: Arc<dyn DispatchStore>,
        coordinator: Arc<ChainCoordinator>,
        registry: Arc<UnitRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            broker,
            store,
            coordinator,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Start `config.count` worker threads named `<name>-<n>`.
    pub fn spawn_pool(self) -> Result<Vec<WorkerHandle>, std::io::Error> {
        let count = self.config.count.max(1);
        let base = self.config.name.clone();
        (0..count)
            .map(|n| {
                let mut worker = self.clone();
                worker.config.name = format!("{base}-{n}");
                worker.spawn()
            })
            .collect()
    }

    /// Spawn the worker in a background thread.
    pub fn spawn(self) -> Result<WorkerHandle, std::io::Error> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let stats_clone = stats.clone();

        let name = self.config.name.clone();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(self, shutdown_rx, stats_clone))?;

        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }

    /// Dequeue and process at most one envelope.
    pub fn run_once(&self, wait: Duration) -> Result<Option<ProcessOutcome>, BrokerError> {
        Ok(self.broker.dequeue(wait)?.map(|env| self.process(env)))
    }

    /// Execute one envelope to completion and report it to the coordinator.
    pub fn process(&self, envelope: UnitEnvelope) -> ProcessOutcome {
        let correlation_id = envelope.correlation_id;
        let (result, attempts, dead_lettered) = match self.registry.get(&envelope.unit) {
            Some(unit) => self.execute_with_retry(&envelope, unit.handler.clone(), &unit.retry),
            None => {
                let err = UnitError::UnknownUnit(envelope.unit.clone());
                warn!(worker = %self.config.name, %correlation_id, unit = %envelope.unit, "no handler for unit");
                self.dead_letter(&envelope, &err, 0);
                (UnitResult::failure(err.to_string()), 0, true)
            }
        };

        let advance = match self
            .coordinator
            .on_unit_complete(correlation_id, &envelope.chain, envelope.index, &result)
        {
            Ok(advance) => Some(advance),
            Err(e) => {
                error!(worker = %self.config.name, %correlation_id, error = %e, "failed to advance chain");
                None
            }
        };

        ProcessOutcome {
            result,
            attempts,
            dead_lettered,
            advance,
        }
    }

    fn execute_with_retry(
        &self,
        envelope: &UnitEnvelope,
        handler: UnitHandler,
        retry: &RetryPolicy,
    ) -> (UnitResult, u32, bool) {
        let correlation_id = envelope.correlation_id;
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.coordinator
                .on_unit_started(correlation_id, envelope.index, attempt);
            info!(
                worker = %self.config.name,
                %correlation_id,
                task_id = %envelope.task_id,
                unit = %envelope.unit,
                attempt,
                "unit started"
            );

            let started = Instant::now();
            match self.execute(handler.clone(), UnitContext::from_envelope(envelope, attempt)) {
                Ok(result) => {
                    info!(
                        worker = %self.config.name,
                        %correlation_id,
                        unit = %envelope.unit,
                        outcome = if result.is_success() { "success" } else { "failure" },
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "unit finished"
                    );
                    return (result, attempt, false);
                }
                Err(err) if err.is_retryable() && retry.should_retry(attempt) => {
                    let delay = retry.delay_for_retry(attempt);
                    warn!(
                        worker = %self.config.name,
                        %correlation_id,
                        unit = %envelope.unit,
                        attempt,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "unit execution error, retrying"
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                Err(err) => {
                    self.dead_letter(envelope, &err, attempt);
                    let reason = format!("{err} (after {attempt} attempts)");
                    return (UnitResult::failure(reason), attempt, true);
                }
            }
        }
    }

    /// Run the handler on a helper thread watched with the unit timeout.
    ///
    /// A unit that overruns is abandoned, not killed: its helper thread runs
    /// to completion in the background. Timeouts are therefore never retried.
    fn execute(&self, handler: UnitHandler, ctx: UnitContext) -> Result<UnitResult, UnitError> {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name(format!("{}-unit", self.config.name))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&ctx)));
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            return Err(UnitError::Transient(format!("failed to spawn unit thread: {e}")));
        }

        match rx.recv_timeout(self.config.unit_timeout) {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(UnitError::Panicked),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(UnitError::Timeout(self.config.unit_timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(UnitError::Panicked),
        }
    }

    fn dead_letter(&self, envelope: &UnitEnvelope, err: &UnitError, attempts: u32) {
        warn!(
            worker = %self.config.name,
            correlation_id = %envelope.correlation_id,
            unit = %envelope.unit,
            attempts,
            error = %err,
            "unit dead-lettered"
        );
        let entry = DeadLetterEntry::new(envelope.clone(), err.to_string(), attempts);
        if let Err(e) = self.store.dead_letter(entry) {
            error!(worker = %self.config.name, error = %e, "failed to record dead letter");
        }
    }
}

fn worker_loop(worker: Worker, shutdown_rx: mpsc::Receiver<()>, stats: Arc<Mutex<WorkerStats>>) {
    let name = worker.config.name.clone();
    info!(worker = %name, "worker started");
    let start_time = Instant::now();

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        if let Ok(mut s) = stats.lock() {
            s.uptime_secs = start_time.elapsed().as_secs();
        }

        match worker.run_once(worker.config.poll_interval) {
            Ok(Some(outcome)) => {
                debug!(worker = %name, attempts = outcome.attempts, "envelope processed");
                if let Ok(mut s) = stats.lock() {
                    s.units_processed += 1;
                    s.retries += u64::from(outcome.attempts.saturating_sub(1));
                    if outcome.result.is_success() {
                        s.units_succeeded += 1;
                    } else {
                        s.units_failed += 1;
                    }
                    if outcome.dead_lettered {
                        s.units_dead_lettered += 1;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(worker = %name, error = %e, "failed to dequeue unit");
                thread::sleep(worker.config.poll_interval);
            }
        }
    }

    info!(worker = %name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::{Value, json};

    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::catalog::ChainCatalog;
    use crate::store::{ChainState, InMemoryDispatchStore, UnitState};
    use crate::types::JobRequest;
    use relay_core::JsonMap;

    struct Fixture {
        broker: Arc<InMemoryBroker>,
        store: Arc<InMemoryDispatchStore>,
        coordinator: Arc<ChainCoordinator>,
    }

    impl Fixture {
        fn new() -> Self {
            let broker = Arc::new(InMemoryBroker::new());
            let store = Arc::new(InMemoryDispatchStore::new());
            let coordinator = Arc::new(ChainCoordinator::new(
                broker.clone(),
                store.clone(),
                ChainCatalog::standard(),
            ));
            Self {
                broker,
                store,
                coordinator,
            }
        }

        fn worker(&self, registry: UnitRegistry, config: WorkerConfig) -> Worker {
            Worker::new(
                self.broker.clone(),
                self.store.clone(),
                self.coordinator.clone(),
                Arc::new(registry),
                config,
            )
        }

        fn dispatch(&self, kind: &str, payload: Value) -> relay_core::CorrelationId {
            let payload: JsonMap = serde_json::from_value(payload).unwrap();
            self.coordinator
                .dispatch_chain(JobRequest::new(kind, payload))
                .unwrap()
                .correlation_id
        }
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig::default()
            .with_poll_interval(Duration::from_millis(10))
            .with_unit_timeout(Duration::from_secs(5))
            .with_latency(LatencyProfile::none())
    }

    #[test]
    fn order_chain_runs_to_completion() {
        let fx = Fixture::new();
        let worker = fx.worker(UnitRegistry::standard(LatencyProfile::none()), fast_config());
        let id = fx.dispatch("order", json!({"order_id": 12345, "user_name": "john_doe"}));

        let first = worker.run_once(Duration::ZERO).unwrap().unwrap();
        assert!(matches!(first.advance, Some(Advance::Enqueued { ref unit, .. }) if unit == "step_two"));

        let second = worker.run_once(Duration::ZERO).unwrap().unwrap();
        assert_eq!(second.advance, Some(Advance::Completed));

        let record = fx.store.get(id).unwrap().unwrap();
        assert_eq!(record.state, ChainState::Completed);
        assert!(record.units.iter().all(|u| u.state == UnitState::Succeeded));
        let payment = record.units[1].output.as_ref().unwrap();
        assert_eq!(payment["transaction_id"], format!("txn_12345_{}", id.short()));
        assert_eq!(fx.broker.pending().unwrap(), 0);
    }

    #[test]
    fn business_failure_is_not_retried() {
        let fx = Fixture::new();
        let worker = fx.worker(UnitRegistry::standard(LatencyProfile::none()), fast_config());
        let id = fx.dispatch("order", json!({"order_id": "not-a-number"}));

        let outcome = worker.run_once(Duration::ZERO).unwrap().unwrap();

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.dead_lettered);
        assert!(matches!(outcome.advance, Some(Advance::Stopped { .. })));
        assert_eq!(fx.broker.pending().unwrap(), 0);
        let record = fx.store.get(id).unwrap().unwrap();
        assert!(matches!(record.state, ChainState::Failed { index: 0, .. }));
    }

    #[test]
    fn exhausted_retries_dead_letter_and_fail() {
        let fx = Fixture::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut registry = UnitRegistry::standard(LatencyProfile::none());
        registry.register("simple_job", RetryPolicy::fixed(2, Duration::ZERO), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(UnitError::Transient("downstream unavailable".to_string()))
        });
        let worker = fx.worker(registry, fast_config());
        let id = fx.dispatch("simple", json!({}));

        let outcome = worker.run_once(Duration::ZERO).unwrap().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.dead_lettered);
        assert!(!outcome.result.is_success());

        let dead = fx.store.list_dead_letters(10).unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(dead[0].envelope.correlation_id, id);

        let record = fx.store.get(id).unwrap().unwrap();
        assert!(matches!(record.state, ChainState::Failed { index: 0, .. }));
        assert_eq!(record.units[0].attempts, 3);
    }

    #[test]
    fn transient_error_then_success_advances() {
        let fx = Fixture::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut registry = UnitRegistry::new();
        registry.register("simple_job", RetryPolicy::fixed(3, Duration::ZERO), move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(UnitError::Transient("flaky".to_string()))
            } else {
                Ok(UnitResult::success(JsonMap::new()))
            }
        });
        let worker = fx.worker(registry, fast_config());
        fx.dispatch("simple", json!({}));

        let outcome = worker.run_once(Duration::ZERO).unwrap().unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.advance, Some(Advance::Completed));
        assert!(fx.store.list_dead_letters(10).unwrap().is_empty());
    }

    #[test]
    fn slow_unit_times_out() {
        let fx = Fixture::new();
        let mut registry = UnitRegistry::new();
        registry.register("simple_job", RetryPolicy::no_retry(), |_| {
            thread::sleep(Duration::from_millis(300));
            Ok(UnitResult::success(JsonMap::new()))
        });
        let config = fast_config().with_unit_timeout(Duration::from_millis(20));
        let worker = fx.worker(registry, config);
        fx.dispatch("simple", json!({}));

        let outcome = worker.run_once(Duration::ZERO).unwrap().unwrap();
        assert!(outcome.dead_lettered);
        assert!(outcome.result.failure_reason().unwrap().contains("timed out"));
    }

    #[test]
    fn timed_out_unit_is_not_started_again() {
        let fx = Fixture::new();
        let started = Arc::new(AtomicU32::new(0));
        let running = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));
        let (s, r, p) = (started.clone(), running.clone(), peak.clone());
        let mut registry = UnitRegistry::new();
        registry.register("simple_job", RetryPolicy::fixed(3, Duration::ZERO), move |_| {
            s.fetch_add(1, Ordering::SeqCst);
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(200));
            r.fetch_sub(1, Ordering::SeqCst);
            Ok(UnitResult::success(JsonMap::new()))
        });
        let config = fast_config().with_unit_timeout(Duration::from_millis(20));
        let worker = fx.worker(registry, config);
        fx.dispatch("simple", json!({}));

        let outcome = worker.run_once(Duration::ZERO).unwrap().unwrap();
        thread::sleep(Duration::from_millis(300));

        assert_eq!(outcome.attempts, 1);
        assert!(outcome.dead_lettered);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_unit_is_contained() {
        let fx = Fixture::new();
        let mut registry = UnitRegistry::new();
        registry.register("simple_job", RetryPolicy::no_retry(), |_| panic!("unit bug"));
        let worker = fx.worker(registry, fast_config());
        fx.dispatch("simple", json!({}));

        let outcome = worker.run_once(Duration::ZERO).unwrap().unwrap();
        assert!(outcome.dead_lettered);
        assert_eq!(
            fx.store.list_dead_letters(1).unwrap()[0].reason,
            UnitError::Panicked.to_string()
        );
    }

    #[test]
    fn unknown_unit_is_dead_lettered_without_running() {
        let fx = Fixture::new();
        let worker = fx.worker(UnitRegistry::new(), fast_config());
        let id = fx.dispatch("simple", json!({}));

        let outcome = worker.run_once(Duration::ZERO).unwrap().unwrap();
        assert_eq!(outcome.attempts, 0);
        assert!(outcome.dead_lettered);
        let record = fx.store.get(id).unwrap().unwrap();
        assert!(matches!(record.state, ChainState::Failed { .. }));
    }

    #[test]
    fn spawned_worker_drains_queue_and_shuts_down() {
        let fx = Fixture::new();
        let worker = fx.worker(UnitRegistry::standard(LatencyProfile::none()), fast_config());
        let id = fx.dispatch("order", json!({"order_id": 1, "user_name": "alice"}));

        let handle = worker.spawn().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline && handle.stats().units_processed < 2 {
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(fx.store.get(id).unwrap().unwrap().state, ChainState::Completed);
        let stats = handle.stats();
        assert_eq!(stats.units_processed, 2);
        assert_eq!(stats.units_succeeded, 2);
        handle.shutdown();
    }

    #[test]
    fn worker_pool_completes_every_chain() {
        let fx = Fixture::new();
        let ids: Vec<_> = (0..40)
            .map(|n| fx.dispatch("order", json!({"order_id": n, "user_name": format!("user{n}")})))
            .collect();

        let config = fast_config().with_name("pool");
        let config = WorkerConfig { count: 2, ..config };
        let handles = fx
            .worker(UnitRegistry::standard(LatencyProfile::none()), config)
            .spawn_pool()
            .unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[1].name(), "pool-1");

        fn processed(handles: &[WorkerHandle]) -> u64 {
            handles.iter().map(|h| h.stats().units_processed).sum()
        }
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline && processed(&handles) < 80 {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(processed(&handles), 80);

        for id in ids {
            let record = fx.store.get(id).unwrap().unwrap();
            assert_eq!(record.state, ChainState::Completed, "chain {id} did not complete");
            assert!(record.units.iter().all(|u| u.state == UnitState::Succeeded));
        }
        for handle in handles {
            handle.shutdown();
        }
    }

    #[test]
    fn config_reads_overrides_and_rejects_garbage() {
        let config = WorkerConfig::from_lookup(|var| match var {
            "WORKER_POLL_MS" => Some("50".to_string()),
            "UNIT_TIMEOUT_SECS" => Some("5".to_string()),
            "WORKER_COUNT" => Some("3".to_string()),
            "JOB_LATENCY_SCALE" => Some("0".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.unit_timeout, Duration::from_secs(5));
        assert_eq!(config.count, 3);
        assert_eq!(config.latency, LatencyProfile::none());

        let err = WorkerConfig::from_lookup(|var| (var == "WORKER_COUNT").then(|| "many".to_string()))
            .unwrap_err();
        assert_eq!(err.var, "WORKER_COUNT");
        assert_eq!(err.value, "many");

        for scale in ["1e20", "-1", "NaN", "inf"] {
            let err = WorkerConfig::from_lookup(|var| (var == "JOB_LATENCY_SCALE").then(|| scale.to_string()))
                .unwrap_err();
            assert_eq!(err.var, "JOB_LATENCY_SCALE");
            assert_eq!(err.value, scale);
        }
        let config = WorkerConfig::from_lookup(|var| (var == "JOB_LATENCY_SCALE").then(|| "100".to_string())).unwrap();
        assert_eq!(config.latency.scale(), MAX_LATENCY_SCALE);
    }
}

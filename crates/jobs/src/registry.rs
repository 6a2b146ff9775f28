//! Named unit handlers consulted by workers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{RetryPolicy, UnitContext, UnitError, UnitResult};
use crate::units::{self, LatencyProfile, SIMPLE_JOB, STEP_ONE, STEP_TWO};

/// Unit handler function type.
pub type UnitHandler = Arc<dyn Fn(&UnitContext) -> Result<UnitResult, UnitError> + Send + Sync>;

/// A handler plus the retry policy for its execution errors.
#[derive(Clone)]
pub struct RegisteredUnit {
    pub handler: UnitHandler,
    pub retry: RetryPolicy,
}

impl core::fmt::Debug for RegisteredUnit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisteredUnit")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Process-wide registry of units, keyed by stable name.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: HashMap<String, RegisteredUnit>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `step_one`, `step_two` and `simple_job` with their demo retry policies.
    ///
    /// Retry delays are scaled together with the simulated work.
    pub fn standard(latency: LatencyProfile) -> Self {
        let mut registry = Self::new();
        let chain_retry = RetryPolicy::fixed(3, Duration::from_secs(2)).scaled(latency.scale());
        let job_retry = RetryPolicy::fixed(3, Duration::from_secs(1)).scaled(latency.scale());

        registry.register(STEP_ONE, chain_retry.clone(), move |ctx| units::step_one(ctx, latency));
        registry.register(STEP_TWO, chain_retry, move |ctx| units::step_two(ctx, latency));
        registry.register(SIMPLE_JOB, job_retry, move |ctx| units::simple_job(ctx, latency));
        registry
    }

    /// Register (or replace) the handler for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, retry: RetryPolicy, handler: F)
    where
        F: Fn(&UnitContext) -> Result<UnitResult, UnitError> + Send + Sync + 'static,
    {
        self.units.insert(
            name.into(),
            RegisteredUnit {
                handler: Arc::new(handler),
                retry,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredUnit> {
        self.units.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ChainCatalog, ChainKind};

    #[test]
    fn standard_registry_covers_every_catalog_unit() {
        let registry = UnitRegistry::standard(LatencyProfile::none());
        let catalog = ChainCatalog::standard();
        for kind in ChainKind::ALL {
            for unit in &catalog.get(kind).unwrap().units {
                assert!(registry.contains(unit), "missing handler for {unit}");
            }
        }
        assert_eq!(registry.names(), vec!["simple_job", "step_one", "step_two"]);
    }

    #[test]
    fn huge_latency_scale_builds_without_panicking() {
        let registry = UnitRegistry::standard(LatencyProfile::scaled(1e20));
        let unit = registry.get("step_one").unwrap();
        assert_eq!(unit.retry.delay, Duration::from_secs(200));
    }

    #[test]
    fn register_replaces_existing_handler() {
        let mut registry = UnitRegistry::new();
        registry.register("x", RetryPolicy::no_retry(), |_| Err(UnitError::Panicked));
        registry.register("x", RetryPolicy::fixed(1, Duration::ZERO), |_| {
            Ok(UnitResult::success(Default::default()))
        });

        let unit = registry.get("x").unwrap();
        assert_eq!(unit.retry.max_retries, 1);
    }
}

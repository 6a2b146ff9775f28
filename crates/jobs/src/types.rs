//! Core job types and policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::{CorrelationId, JsonMap, TaskId};

/// Inbound dispatch request, as parsed by the HTTP layer.
///
/// `kind` is kept raw so the coordinator owns the decision of which chains
/// exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub kind: String,
    #[serde(default)]
    pub payload: JsonMap,
}

impl JobRequest {
    pub fn new(kind: impl Into<String>, payload: JsonMap) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// A unit of work as it travels through the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEnvelope {
    pub task_id: TaskId,
    pub correlation_id: CorrelationId,
    /// Unit names of the whole chain, in order.
    pub chain: Vec<String>,
    /// Position of `unit` within `chain`.
    pub index: usize,
    pub unit: String,
    pub args: JsonMap,
    pub enqueued_at: DateTime<Utc>,
}

impl UnitEnvelope {
    /// Build the envelope for `chain[index]`.
    ///
    /// Returns `None` if `index` is out of range.
    pub fn for_step(
        correlation_id: CorrelationId,
        chain: &[String],
        index: usize,
        args: JsonMap,
    ) -> Option<Self> {
        let unit = chain.get(index)?.clone();
        Some(Self {
            task_id: TaskId::new(),
            correlation_id,
            chain: chain.to_vec(),
            index,
            unit,
            args,
            enqueued_at: Utc::now(),
        })
    }

}

/// Outcome reported by a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Success,
    Failure,
}

/// Result of executing a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    pub status: UnitStatus,
    pub output: JsonMap,
    /// Arguments for the next unit of the chain. `None` forwards an empty map.
    pub next_unit_args: Option<JsonMap>,
}

impl UnitResult {
    pub fn success(output: JsonMap) -> Self {
        Self {
            status: UnitStatus::Success,
            output,
            next_unit_args: None,
        }
    }

    /// Business failure. The reason is stored under `"error"` in the output.
    pub fn failure(reason: impl Into<String>) -> Self {
        let mut output = JsonMap::new();
        output.insert("error".to_string(), serde_json::Value::String(reason.into()));
        Self {
            status: UnitStatus::Failure,
            output,
            next_unit_args: None,
        }
    }

    pub fn with_next_args(mut self, args: JsonMap) -> Self {
        self.next_unit_args = Some(args);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == UnitStatus::Success
    }

    /// Failure reason, if the unit failed.
    pub fn failure_reason(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        Some(
            self.output
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unit failed")
                .to_string(),
        )
    }
}

/// Execution error raised by a unit (as opposed to a business failure).
///
/// Execution errors are retried according to the unit's [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("unit timed out after {0:?}")]
    Timeout(Duration),
    #[error("unit panicked")]
    Panicked,
    #[error("no unit registered under `{0}`")]
    UnknownUnit(String),
}

impl UnitError {
    /// A timed-out unit may still be running on its helper thread, so it is
    /// never started a second time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UnitError::Transient(_) | UnitError::Panicked)
    }
}

/// Everything a unit sees while executing.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub correlation_id: CorrelationId,
    pub task_id: TaskId,
    pub unit: String,
    pub index: usize,
    /// 1-indexed execution attempt.
    pub attempt: u32,
    pub args: JsonMap,
}

impl UnitContext {
    pub fn from_envelope(envelope: &UnitEnvelope, attempt: u32) -> Self {
        Self {
            correlation_id: envelope.correlation_id,
            task_id: envelope.task_id,
            unit: envelope.unit.clone(),
            index: envelope.index,
            attempt,
            args: envelope.args.clone(),
        }
    }
}

/// Retry policy applied to unit execution errors: a fixed delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (0 = no retries)
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Delay before retry number `retry` (1-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 { Duration::ZERO } else { self.delay }
    }

    /// Whether another attempt is allowed after `attempt` attempts have run.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Scale the delay (used to shorten demo delays in tests).
    pub fn scaled(mut self, factor: f64) -> Self {
        self.delay = scale_duration(self.delay, factor);
        self
    }
}

/// `base * factor`, saturating at `Duration::MAX`. Negative or NaN factors give zero.
pub(crate) fn scale_duration(base: Duration, factor: f64) -> Duration {
    let factor = factor.max(0.0);
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Entry in the dead-letter list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub envelope: UnitEnvelope,
    pub reason: String,
    pub attempts: u32,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn new(envelope: UnitEnvelope, reason: String, attempts: u32) -> Self {
        Self {
            envelope,
            reason,
            attempts,
            dead_lettered_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Vec<String> {
        vec!["step_one".to_string(), "step_two".to_string()]
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));

        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(0), Duration::ZERO);
    }

    #[test]
    fn scaling_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));

        assert_eq!(policy.clone().scaled(0.5).delay, Duration::from_secs(1));
        assert_eq!(policy.clone().scaled(-1.0).delay, Duration::ZERO);
        assert_eq!(policy.clone().scaled(f64::NAN).delay, Duration::ZERO);
        assert_eq!(policy.scaled(1e300).delay, Duration::MAX);
    }

    #[test]
    fn timeouts_are_not_retryable() {
        assert!(UnitError::Transient("flaky".to_string()).is_retryable());
        assert!(UnitError::Panicked.is_retryable());
        assert!(!UnitError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!UnitError::UnknownUnit("x".to_string()).is_retryable());
    }

    #[test]
    fn should_retry_counts_the_first_attempt() {
        let policy = RetryPolicy::fixed(2, Duration::ZERO);

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::no_retry().should_retry(1));
    }

    #[test]
    fn envelope_for_step_tracks_position() {
        let id = CorrelationId::new();
        let first = UnitEnvelope::for_step(id, &chain(), 0, JsonMap::new()).unwrap();
        assert_eq!(first.unit, "step_one");

        let second = UnitEnvelope::for_step(id, &chain(), 1, JsonMap::new()).unwrap();
        assert_eq!(second.unit, "step_two");
        assert_ne!(first.task_id, second.task_id);

        assert!(UnitEnvelope::for_step(id, &chain(), 2, JsonMap::new()).is_none());
    }

    #[test]
    fn failure_reason_reads_error_field() {
        let failed = UnitResult::failure("order not validated");
        assert_eq!(failed.failure_reason().as_deref(), Some("order not validated"));
        assert!(UnitResult::success(JsonMap::new()).failure_reason().is_none());
    }
}

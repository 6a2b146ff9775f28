//! The demo units: order validation, payment, and an independent job.
//!
//! Each unit simulates I/O with a bounded sleep scaled by a [`LatencyProfile`]
//! and returns a deterministic outcome for a given input.

use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::info;

use relay_core::JsonMap;

use crate::catalog::{MAX_REPEAT, simple_parameters};
use crate::types::{UnitContext, UnitError, UnitResult, scale_duration};

pub const STEP_ONE: &str = "step_one";
pub const STEP_TWO: &str = "step_two";
pub const SIMPLE_JOB: &str = "simple_job";

/// Amount charged for every demo order.
const ORDER_TOTAL: f64 = 99.99;

/// Largest accepted latency multiplier.
pub const MAX_LATENCY_SCALE: f64 = 100.0;

/// Multiplier applied to each unit's simulated work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyProfile {
    scale: f64,
}

impl LatencyProfile {
    /// Real demo delays (2 s, 1.5 s, 0.5 s).
    pub fn demo() -> Self {
        Self { scale: 1.0 }
    }

    /// No simulated work at all.
    pub fn none() -> Self {
        Self { scale: 0.0 }
    }

    /// Clamped to `0..=MAX_LATENCY_SCALE`; non-finite values fall back to the demo scale.
    pub fn scaled(scale: f64) -> Self {
        Self {
            scale: if scale.is_finite() { scale.clamp(0.0, MAX_LATENCY_SCALE) } else { 1.0 },
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn delay(&self, base: Duration) -> Duration {
        scale_duration(base, self.scale)
    }

    fn simulate(&self, base: Duration) {
        let d = self.delay(base);
        if !d.is_zero() {
            thread::sleep(d);
        }
    }
}

impl Default for LatencyProfile {
    fn default() -> Self {
        Self::demo()
    }
}

fn int_arg(args: &JsonMap, key: &str) -> Result<i64, String> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("missing or non-integer argument `{key}`"))
}

fn str_arg<'a>(args: &'a JsonMap, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing or non-string argument `{key}`"))
}

fn object(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

/// Validate an order. On success, hands `{order_id, amount, validated}` to the next unit.
pub fn step_one(ctx: &UnitContext, latency: LatencyProfile) -> Result<UnitResult, UnitError> {
    let (order_id, user_name) = match (int_arg(&ctx.args, "order_id"), str_arg(&ctx.args, "user_name")) {
        (Ok(id), Ok(name)) => (id, name.to_string()),
        (Err(e), _) | (_, Err(e)) => return Ok(UnitResult::failure(e)),
    };

    info!(correlation_id = %ctx.correlation_id, order_id, user_name = %user_name, "validating order");
    latency.simulate(Duration::from_secs(2));

    let output = object(json!({
        "order_id": order_id,
        "user_name": user_name,
        "status": "validated",
        "total_amount": ORDER_TOTAL,
    }));
    let next = object(json!({
        "order_id": order_id,
        "amount": ORDER_TOTAL,
        "validated": true,
    }));

    info!(correlation_id = %ctx.correlation_id, order_id, total_amount = ORDER_TOTAL, "order validated");
    Ok(UnitResult::success(output).with_next_args(next))
}

/// Take payment for a validated order.
pub fn step_two(ctx: &UnitContext, latency: LatencyProfile) -> Result<UnitResult, UnitError> {
    let order_id = match int_arg(&ctx.args, "order_id") {
        Ok(id) => id,
        Err(e) => return Ok(UnitResult::failure(e)),
    };
    let Some(amount) = ctx.args.get("amount").and_then(Value::as_f64) else {
        return Ok(UnitResult::failure("missing or non-numeric argument `amount`"));
    };
    let validated = ctx.args.get("validated").and_then(Value::as_bool).unwrap_or(false);

    if !validated {
        info!(correlation_id = %ctx.correlation_id, order_id, "order not validated, skipping payment");
        return Ok(UnitResult::failure("order not validated"));
    }

    info!(correlation_id = %ctx.correlation_id, order_id, amount, "processing payment");
    latency.simulate(Duration::from_millis(1500));

    let transaction_id = format!("txn_{order_id}_{}", ctx.correlation_id.short());
    info!(correlation_id = %ctx.correlation_id, order_id, transaction_id = %transaction_id, "payment completed");

    Ok(UnitResult::success(object(json!({
        "order_id": order_id,
        "amount_charged": amount,
        "payment_status": "completed",
        "transaction_id": transaction_id,
    }))))
}

/// Independent job: repeats `message` with an index suffix.
pub fn simple_job(ctx: &UnitContext, latency: LatencyProfile) -> Result<UnitResult, UnitError> {
    let (message, repeat) = simple_parameters(&ctx.args);
    if repeat > MAX_REPEAT {
        return Ok(UnitResult::failure(format!("`repeat` must be at most {MAX_REPEAT}")));
    }
    latency.simulate(Duration::from_millis(500));

    let results: Vec<String> = (0..repeat).map(|i| format!("{message}_{i}")).collect();
    info!(correlation_id = %ctx.correlation_id, count = results.len(), "simple job completed");

    Ok(UnitResult::success(object(json!({ "results": results }))))
}

#[cfg(test)]
mod tests {
    use relay_core::{CorrelationId, TaskId};

    use super::*;
    use crate::types::UnitStatus;

    fn ctx(unit: &str, args: Value) -> UnitContext {
        UnitContext {
            correlation_id: CorrelationId::new(),
            task_id: TaskId::new(),
            unit: unit.to_string(),
            index: 0,
            attempt: 1,
            args: object(args),
        }
    }

    #[test]
    fn step_one_validates_and_forwards_payment_args() {
        let c = ctx(STEP_ONE, json!({"order_id": 12345, "user_name": "john_doe"}));
        let result = step_one(&c, LatencyProfile::none()).unwrap();

        assert!(result.is_success());
        assert_eq!(result.output["status"], "validated");
        assert_eq!(
            Value::Object(result.next_unit_args.unwrap()),
            json!({"order_id": 12345, "amount": 99.99, "validated": true})
        );
    }

    #[test]
    fn step_one_fails_on_missing_args() {
        let c = ctx(STEP_ONE, json!({"order_id": 1}));
        let result = step_one(&c, LatencyProfile::none()).unwrap();
        assert_eq!(result.status, UnitStatus::Failure);
        assert!(result.failure_reason().unwrap().contains("user_name"));
        assert!(result.next_unit_args.is_none());
    }

    #[test]
    fn step_two_refuses_unvalidated_orders() {
        let c = ctx(STEP_TWO, json!({"order_id": 7, "amount": 10.0, "validated": false}));
        let result = step_two(&c, LatencyProfile::none()).unwrap();
        assert_eq!(result.failure_reason().as_deref(), Some("order not validated"));
    }

    #[test]
    fn step_two_charges_validated_orders() {
        let c = ctx(STEP_TWO, json!({"order_id": 7, "amount": 99.99, "validated": true}));
        let result = step_two(&c, LatencyProfile::none()).unwrap();

        assert!(result.is_success());
        assert_eq!(result.output["payment_status"], "completed");
        assert_eq!(
            result.output["transaction_id"],
            format!("txn_7_{}", c.correlation_id.short())
        );
    }

    #[test]
    fn simple_job_repeats_message() {
        let c = ctx(SIMPLE_JOB, json!({"message": "hello", "repeat": 3}));
        let result = simple_job(&c, LatencyProfile::none()).unwrap();
        assert_eq!(result.output["results"], json!(["hello_0", "hello_1", "hello_2"]));
    }

    #[test]
    fn latency_profile_scales_delays() {
        assert_eq!(LatencyProfile::none().delay(Duration::from_secs(2)), Duration::ZERO);
        assert_eq!(
            LatencyProfile::scaled(0.5).delay(Duration::from_secs(2)),
            Duration::from_secs(1)
        );
        assert_eq!(LatencyProfile::scaled(f64::NAN).scale(), 1.0);
        assert_eq!(LatencyProfile::scaled(1e20).scale(), MAX_LATENCY_SCALE);
        assert_eq!(LatencyProfile::scaled(-3.0).scale(), 0.0);
    }

    #[test]
    fn simple_job_rejects_oversized_repeat() {
        let c = ctx(SIMPLE_JOB, json!({"message": "x", "repeat": MAX_REPEAT + 1}));
        let result = simple_job(&c, LatencyProfile::none()).unwrap();
        assert!(result.failure_reason().unwrap().contains("repeat"));

        let c = ctx(SIMPLE_JOB, json!({"message": "x", "repeat": MAX_REPEAT}));
        let result = simple_job(&c, LatencyProfile::none()).unwrap();
        assert!(result.is_success());
    }
}

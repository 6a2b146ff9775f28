//! Chain definitions: which units run, in which order, for each request kind.

use core::str::FromStr;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use relay_core::JsonMap;

use crate::units::{SIMPLE_JOB, STEP_ONE, STEP_TWO};

/// Kinds of chains a client can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainKind {
    /// Order processing: validate, then take payment.
    Order,
    /// A single independent job.
    Simple,
}

impl ChainKind {
    pub const ALL: [ChainKind; 2] = [ChainKind::Order, ChainKind::Simple];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainKind::Order => "order",
            ChainKind::Simple => "simple",
        }
    }

    /// Human-facing acknowledgement returned on dispatch.
    pub fn dispatch_message(&self) -> &'static str {
        match self {
            ChainKind::Order => "Order processing job chain started",
            ChainKind::Simple => "Job started",
        }
    }

    /// Request fields echoed back to the caller on dispatch.
    pub fn echo(&self, payload: &JsonMap) -> JsonMap {
        let mut echoed = JsonMap::new();
        match self {
            ChainKind::Order => {
                for key in ["order_id", "user_name"] {
                    echoed.insert(key.to_string(), payload.get(key).cloned().unwrap_or(Value::Null));
                }
            }
            ChainKind::Simple => {
                let (message, repeat) = simple_parameters(payload);
                echoed.insert(
                    "parameters".to_string(),
                    json!({ "message": message, "repeat": repeat }),
                );
            }
        }
        echoed
    }

    /// Reject payloads a unit of this chain could never run within bounds.
    pub fn validate(&self, payload: &JsonMap) -> Result<(), InvalidPayload> {
        match self {
            ChainKind::Order => Ok(()),
            ChainKind::Simple => {
                let (_, repeat) = simple_parameters(payload);
                if repeat > MAX_REPEAT {
                    return Err(InvalidPayload(format!("`repeat` must be at most {MAX_REPEAT}, got {repeat}")));
                }
                Ok(())
            }
        }
    }
}

impl core::fmt::Display for ChainKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a request names a chain kind that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown chain kind `{0}`")]
pub struct UnknownChainKind(pub String);

impl FromStr for ChainKind {
    type Err = UnknownChainKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order" => Ok(ChainKind::Order),
            "simple" => Ok(ChainKind::Simple),
            _ => Err(UnknownChainKind(s.to_string())),
        }
    }
}

/// Raised when a payload is outside the limits of its chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid payload: {0}")]
pub struct InvalidPayload(pub String);

/// Upper bound on `simple_job`'s `repeat`.
pub const MAX_REPEAT: u64 = 10_000;

/// Defaults applied to the `simple_job` arguments.
pub(crate) fn simple_parameters(payload: &JsonMap) -> (String, u64) {
    let message = payload
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("test")
        .to_string();
    let repeat = payload.get("repeat").and_then(|v| v.as_u64()).unwrap_or(3);
    (message, repeat)
}

/// Fixed, ordered list of unit names for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDefinition {
    pub kind: ChainKind,
    pub units: Vec<String>,
}

impl ChainDefinition {
    pub fn new(kind: ChainKind, units: &[&str]) -> Self {
        Self {
            kind,
            units: units.iter().map(|u| u.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Registry of chain definitions, keyed by kind.
#[derive(Debug, Clone)]
pub struct ChainCatalog {
    chains: HashMap<ChainKind, ChainDefinition>,
}

impl ChainCatalog {
    pub fn empty() -> Self {
        Self {
            chains: HashMap::new(),
        }
    }

    /// The chains served by the demo API.
    pub fn standard() -> Self {
        Self::empty()
            .with(ChainDefinition::new(ChainKind::Order, &[STEP_ONE, STEP_TWO]))
            .with(ChainDefinition::new(ChainKind::Simple, &[SIMPLE_JOB]))
    }

    pub fn with(mut self, definition: ChainDefinition) -> Self {
        self.chains.insert(definition.kind, definition);
        self
    }

    pub fn get(&self, kind: ChainKind) -> Option<&ChainDefinition> {
        self.chains.get(&kind)
    }
}

impl Default for ChainCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!("order".parse::<ChainKind>().unwrap(), ChainKind::Order);
        assert_eq!(" Simple ".parse::<ChainKind>().unwrap(), ChainKind::Simple);
        assert_eq!(
            "unknown".parse::<ChainKind>().unwrap_err(),
            UnknownChainKind("unknown".to_string())
        );
    }

    #[test]
    fn standard_catalog_defines_every_kind() {
        let catalog = ChainCatalog::standard();
        for kind in ChainKind::ALL {
            let def = catalog.get(kind).unwrap();
            assert!(!def.is_empty());
        }
        assert_eq!(catalog.get(ChainKind::Order).unwrap().units, vec!["step_one", "step_two"]);
        assert_eq!(catalog.get(ChainKind::Simple).unwrap().units, vec!["simple_job"]);
    }

    #[test]
    fn order_echoes_order_fields() {
        let payload: JsonMap = serde_json::from_value(json!({
            "order_id": 12345, "user_name": "john_doe", "extra": true
        }))
        .unwrap();
        let echoed = ChainKind::Order.echo(&payload);
        assert_eq!(echoed["order_id"], 12345);
        assert_eq!(echoed["user_name"], "john_doe");
        assert!(!echoed.contains_key("extra"));
    }

    #[test]
    fn simple_payload_repeat_is_capped() {
        let within: JsonMap = serde_json::from_value(json!({"repeat": MAX_REPEAT})).unwrap();
        assert!(ChainKind::Simple.validate(&within).is_ok());

        let over: JsonMap = serde_json::from_value(json!({"repeat": 10_000_000_000u64})).unwrap();
        let err = ChainKind::Simple.validate(&over).unwrap_err();
        assert!(err.to_string().contains("repeat"));

        assert!(ChainKind::Order.validate(&over).is_ok());
    }

    #[test]
    fn simple_echo_applies_defaults() {
        let echoed = ChainKind::Simple.echo(&JsonMap::new());
        assert_eq!(echoed["parameters"], json!({"message": "test", "repeat": 3}));
    }
}

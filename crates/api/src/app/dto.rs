use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use relay_core::JsonMap;
use relay_jobs::{ChainKind, DeadLetterEntry, JobRequest};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OrderJobRequest {
    pub order_id: i64,
    pub user_name: String,
}

impl From<OrderJobRequest> for JobRequest {
    fn from(body: OrderJobRequest) -> Self {
        JobRequest::new(
            ChainKind::Order.as_str(),
            object(json!({ "order_id": body.order_id, "user_name": body.user_name })),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SimpleJobRequest {
    pub message: Option<String>,
    pub repeat: Option<u64>,
}

impl From<SimpleJobRequest> for JobRequest {
    fn from(body: SimpleJobRequest) -> Self {
        let mut payload = JsonMap::new();
        if let Some(message) = body.message {
            payload.insert("message".to_string(), Value::String(message));
        }
        if let Some(repeat) = body.repeat {
            payload.insert("repeat".to_string(), Value::from(repeat));
        }
        JobRequest::new(ChainKind::Simple.as_str(), payload)
    }
}

#[derive(Debug, Deserialize)]
pub struct SvgQuery {
    #[serde(rename = "useCache")]
    pub use_cache: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    pub limit: Option<usize>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CounterResponse {
    pub counter: i64,
    pub method: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeadLettersResponse {
    pub count: usize,
    pub entries: Vec<DeadLetterEntry>,
}

fn object(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

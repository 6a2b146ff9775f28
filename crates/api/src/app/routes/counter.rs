use std::sync::Arc;

use axum::{Json, extract::Extension};

use crate::app::dto::CounterResponse;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

const COUNTER_KEY: &str = "counter:demo";

/// Increment the demo counter; the store call runs on the blocking pool.
pub async fn increment(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<CounterResponse>, ApiError> {
    let kv = services.kv.clone();
    let counter = tokio::task::spawn_blocking(move || kv.incr(COUNTER_KEY)).await??;
    Ok(Json(CounterResponse {
        counter,
        method: "async handler -> blocking store call (via spawn_blocking)",
    }))
}

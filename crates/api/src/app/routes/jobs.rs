use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    routing::{get, post},
};

use relay_core::CorrelationId;
use relay_jobs::{DispatchAck, DispatchRecord, JobRequest};

use crate::app::dto::{self, DeadLettersResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

const DEFAULT_DEAD_LETTER_LIMIT: usize = 50;

pub fn router() -> Router {
    Router::new()
        .route("/jobs", post(dispatch))
        .route("/jobs/order", post(dispatch_order))
        .route("/jobs/simple", post(dispatch_simple))
        .route("/jobs/:correlation_id", get(get_status))
        .route("/dead-letters", get(dead_letters))
}

/// Hand the request to the coordinator and acknowledge once the first unit is queued.
async fn start_chain(services: Arc<AppServices>, request: JobRequest) -> Result<Json<DispatchAck>, ApiError> {
    let payload = request.payload.clone();
    let coordinator = services.coordinator.clone();
    let record = tokio::task::spawn_blocking(move || coordinator.dispatch_chain(request)).await??;
    Ok(Json(DispatchAck::new(&record, &payload)))
}

pub async fn dispatch(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<DispatchAck>, ApiError> {
    let Json(request) = body?;
    start_chain(services, request).await
}

pub async fn dispatch_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::OrderJobRequest>, JsonRejection>,
) -> Result<Json<DispatchAck>, ApiError> {
    let Json(order) = body?;
    start_chain(services, order.into()).await
}

pub async fn dispatch_simple(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SimpleJobRequest>, JsonRejection>,
) -> Result<Json<DispatchAck>, ApiError> {
    let Json(job) = body?;
    start_chain(services, job.into()).await
}

pub async fn get_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(raw): Path<String>,
) -> Result<Json<DispatchRecord>, ApiError> {
    let correlation_id: CorrelationId = raw.parse()?;
    let store = services.store.clone();
    let record = tokio::task::spawn_blocking(move || store.get(correlation_id)).await??;
    record
        .map(Json)
        .ok_or_else(|| ApiError::DispatchNotFound(raw))
}

pub async fn dead_letters(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::DeadLetterQuery>,
) -> Result<Json<DeadLettersResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_DEAD_LETTER_LIMIT);
    let store = services.store.clone();
    let entries = tokio::task::spawn_blocking(move || store.list_dead_letters(limit)).await??;
    Ok(Json(DeadLettersResponse {
        count: entries.len(),
        entries,
    }))
}

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use relay_cache::CacheError;
use relay_core::CoreError;
use relay_jobs::{DispatchError, StoreError};

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    InvalidBody(String),
    #[error("no user with id {0}")]
    UserNotFound(u64),
    #[error("no dispatch with correlation id {0}")]
    DispatchNotFound(String),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ApiError::Dispatch(DispatchError::InvalidChainKind(_)) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_chain_kind", message)
            }
            ApiError::Dispatch(DispatchError::BrokerUnavailable(_)) => {
                json_error(StatusCode::SERVICE_UNAVAILABLE, "broker_unavailable", message)
            }
            ApiError::Dispatch(DispatchError::Store(_)) | ApiError::Store(_) => {
                error!(error = %message, "status store failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
            }
            ApiError::Cache(CacheError::Unavailable(_)) => {
                json_error(StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable", message)
            }
            ApiError::Cache(CacheError::NotAnInteger(_)) => {
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "cache_error", message)
            }
            ApiError::Core(CoreError::Validation(_))
            | ApiError::InvalidBody(_)
            | ApiError::Dispatch(DispatchError::InvalidPayload(_)) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_body", message)
            }
            ApiError::Core(CoreError::InvalidId(_)) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_id", message)
            }
            ApiError::Core(CoreError::NotFound) | ApiError::DispatchNotFound(_) => {
                json_error(StatusCode::NOT_FOUND, "not_found", message)
            }
            ApiError::UserNotFound(_) => json_error(StatusCode::NOT_FOUND, "User not found", message),
            ApiError::Join(_) => {
                error!(error = %message, "blocking task failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: collaborator wiring (broker, status store, KV store, coordinator)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::users::UserStore;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, StartupError};

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<AppServices>, users: Arc<UserStore>) -> Router {
    Router::new().nest("/api/v1", routes::router()).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(Extension(services))
            .layer(Extension(users)),
    )
}

use axum::{Router, routing::get};

pub mod counter;
pub mod jobs;
pub mod svg;
pub mod system;
pub mod users;

/// Router for every `/api/v1` endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/counter", get(counter::increment))
        .route("/svg", get(svg::render))
        .nest("/users", users::router())
        .merge(jobs::router())
}

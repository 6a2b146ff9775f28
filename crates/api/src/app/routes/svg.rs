use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::header,
    response::IntoResponse,
};

use relay_cache::get_or_compute;

use crate::app::dto::SvgQuery;
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

const SVG_CACHE_KEY: &str = "svg:complex:v1";

pub async fn render(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<SvgQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let use_cache = query.use_cache.unwrap_or(true);
    let ttl = services.svg_cache_ttl;
    let kv = services.kv.clone();

    let (body, cache_hit) = tokio::task::spawn_blocking(move || {
        get_or_compute(&kv, SVG_CACHE_KEY, ttl, !use_cache, || {
            crate::svg::generate().into_bytes()
        })
    })
    .await?;

    let cache_control = if use_cache {
        format!("public, max-age={}", ttl.as_secs())
    } else {
        "no-cache".to_string()
    };

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml".to_string()),
            (header::CACHE_CONTROL, cache_control),
            (
                header::HeaderName::from_static("x-cache-hit"),
                cache_hit.to_string(),
            ),
        ],
        body,
    ))
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use relay_core::{CoreError, UserId};

use crate::app::errors::ApiError;
use crate::users::{NewUser, User, UserStore};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user))
}

pub async fn list_users(Extension(users): Extension<Arc<UserStore>>) -> Json<Vec<User>> {
    Json(users.list())
}

pub async fn get_user(
    Extension(users): Extension<Arc<UserStore>>,
    Path(id): Path<u64>,
) -> Result<Json<User>, ApiError> {
    match users.get(UserId(id)) {
        Ok(user) => Ok(Json(user)),
        Err(CoreError::NotFound) => Err(ApiError::UserNotFound(id)),
        Err(e) => Err(e.into()),
    }
}

pub async fn create_user(
    Extension(users): Extension<Arc<UserStore>>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new_user) = body?;
    let user = users.create(new_user)?;
    tracing::info!(user_id = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

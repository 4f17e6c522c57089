use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::AppError,
    state::AppState,
    users::{
        dto::{CreateUserRequest, ListQuery, ListUsersResponse, UpdateUserRequest, UserResponse},
        services::{self, parse_user_id},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::Validation(e.body_text()))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let req = body(payload)?;
    let user = services::create_user(state.users.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    query: Option<Query<ListQuery>>,
) -> Result<Json<ListUsersResponse>, AppError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let res = services::list_users(state.users.as_ref(), &query).await?;
    Ok(Json(res))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let id = parse_user_id(&id)?;
    let user = services::get_user(state.users.as_ref(), id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let id = parse_user_id(&id)?;
    let req = body(payload)?;
    let user = services::update_user(state.users.as_ref(), id, req).await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_user_id(&id)?;
    services::delete_user(state.users.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

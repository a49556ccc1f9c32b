use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ListInput, TaskInput},
    repo_types::{List, Task},
    services,
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::{ApiJson, AppResult},
    state::AppState,
};

pub fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/lists", get(get_lists).post(create_list))
        .route(
            "/lists/:listid",
            get(get_list).put(update_list).delete(delete_list),
        )
        .route("/lists/:listid/tasks", get(get_tasks).post(create_task))
        .route(
            "/lists/:listid/tasks/:taskid",
            get(get_task).put(update_task).delete(delete_task),
        )
}

// The `AuthUser` extractor comes first in every handler so an unauthenticated
// request is rejected before paths or bodies are looked at.

#[instrument(skip(state))]
pub async fn get_lists(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<List>>> {
    let lists = services::lists_for(state.todos.as_ref(), &username).await?;
    Ok(Json(lists))
}

#[instrument(skip(state, input))]
pub async fn create_list(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ListInput>,
) -> AppResult<Json<List>> {
    let list = services::create_list(state.todos.as_ref(), &username, input).await?;
    Ok(Json(list))
}

#[instrument(skip(state))]
pub async fn get_list(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    Path(list_id): Path<Uuid>,
) -> AppResult<Json<List>> {
    let list = services::owned_list(state.todos.as_ref(), list_id, &username).await?;
    Ok(Json(list))
}

#[instrument(skip(state, input))]
pub async fn update_list(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    Path(list_id): Path<Uuid>,
    ApiJson(input): ApiJson<ListInput>,
) -> AppResult<Json<List>> {
    let list = services::update_list(state.todos.as_ref(), list_id, &username, input).await?;
    Ok(Json(list))
}

#[instrument(skip(state))]
pub async fn delete_list(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    Path(list_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_list(state.todos.as_ref(), list_id, &username).await?;
    Ok(Json(MessageResponse::success()))
}

#[instrument(skip(state))]
pub async fn get_tasks(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    Path(list_id): Path<Uuid>,
) -> AppResult<Json<Vec<Task>>> {
    let tasks = services::list_tasks(state.todos.as_ref(), list_id, &username).await?;
    Ok(Json(tasks))
}

#[instrument(skip(state))]
pub async fn get_task(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    Path((list_id, task_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Task>> {
    let task = services::get_task(state.todos.as_ref(), list_id, task_id, &username).await?;
    Ok(Json(task))
}

#[instrument(skip(state, input))]
pub async fn create_task(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    Path(list_id): Path<Uuid>,
    ApiJson(input): ApiJson<TaskInput>,
) -> AppResult<Json<Task>> {
    let task = services::create_task(state.todos.as_ref(), list_id, &username, input).await?;
    Ok(Json(task))
}

#[instrument(skip(state, input))]
pub async fn update_task(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    Path((list_id, task_id)): Path<(Uuid, Uuid)>,
    ApiJson(input): ApiJson<TaskInput>,
) -> AppResult<Json<Task>> {
    let task =
        services::update_task(state.todos.as_ref(), list_id, task_id, &username, input).await?;
    Ok(Json(task))
}

#[instrument(skip(state))]
pub async fn delete_task(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    Path((list_id, task_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<MessageResponse>> {
    services::delete_task(state.todos.as_ref(), list_id, task_id, &username).await?;
    Ok(Json(MessageResponse::success()))
}

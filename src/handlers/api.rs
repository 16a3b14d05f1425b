use axum::extract::{Path, State};
use axum::{http::StatusCode, response::IntoResponse, Json};
use tracing::info;

use crate::error::AppError;
use crate::middleware::{CurrentUser, Origin};
use crate::models::{CreateTask, Task, TaskPatch};
use crate::validate;
use crate::AppState;

pub async fn list_todos(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, AppError> {
    let todos = state.backend.list_tasks(&user.id)?;
    info!(count = todos.len(), "Listed todos");
    Ok(Json(todos))
}

pub async fn create_todo(
    CurrentUser(user): CurrentUser,
    Origin(origin): Origin,
    State(state): State<AppState>,
    Json(req): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    validate::task(&req.task)?;

    let task = state
        .backend
        .insert_task(&user.id, &req.task, origin.as_deref())?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_todo(
    CurrentUser(user): CurrentUser,
    Origin(origin): Origin,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, AppError> {
    if let Some(ref text) = patch.task {
        validate::task(text)?;
    }

    let task = state
        .backend
        .update_task(&user.id, &id, &patch, origin.as_deref())?;
    Ok(Json(task))
}

pub async fn delete_todo(
    CurrentUser(user): CurrentUser,
    Origin(origin): Origin,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state
        .backend
        .delete_task(&user.id, &id, origin.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

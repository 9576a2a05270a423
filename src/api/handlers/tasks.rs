//! `/api/tasks/*` handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::middleware::{parse_id, ApiJson, Authz};
use crate::api::routes::AppState;
use crate::error::ServiceError;
use crate::task::{SubtaskDraft, SubtaskPatch, TaskDraft, TaskPatchDraft, TaskQuery};

pub async fn list(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.tasks.list(&identity, query).await?))
}

pub async fn due_soon(State(state): State<AppState>, Authz(identity): Authz) -> impl IntoResponse {
    Json(state.tasks.due_soon(&identity).await)
}

pub async fn by_status(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(status): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.tasks.list_by_status(&identity, &status).await?))
}

pub async fn by_project(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(project): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = parse_id(&project, "Project")?;
    Ok(Json(state.tasks.list_by_project(&identity, project).await))
}

pub async fn create(
    State(state): State<AppState>,
    Authz(identity): Authz,
    ApiJson(draft): ApiJson<TaskDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let task = state.tasks.create(&identity, draft).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Task")?;
    Ok(Json(state.tasks.get(&identity, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(id): Path<String>,
    ApiJson(draft): ApiJson<TaskPatchDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Task")?;
    Ok(Json(state.tasks.update(&identity, id, draft).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Task")?;
    let id = state.tasks.delete(&identity, id).await?;
    Ok(Json(json!({ "message": "Task removed", "id": id })))
}

pub async fn toggle_complete(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Task")?;
    Ok(Json(state.tasks.toggle_complete(&identity, id).await?))
}

pub async fn add_subtask(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(id): Path<String>,
    ApiJson(draft): ApiJson<SubtaskDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Task")?;
    Ok(Json(state.tasks.add_subtask(&identity, id, draft).await?))
}

pub async fn toggle_subtask(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path((id, subtask_id)): Path<(String, String)>,
    ApiJson(patch): ApiJson<SubtaskPatch>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Task")?;
    let subtask_id = parse_id(&subtask_id, "Subtask")?;
    Ok(Json(
        state
            .tasks
            .toggle_subtask(&identity, id, subtask_id, patch)
            .await?,
    ))
}

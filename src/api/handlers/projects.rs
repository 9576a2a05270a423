//! `/api/projects/*` handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::middleware::{parse_id, ApiJson, Authz};
use crate::api::routes::AppState;
use crate::error::ServiceError;
use crate::project::{ProjectDraft, ProjectPatchDraft};

pub async fn list(State(state): State<AppState>, Authz(identity): Authz) -> impl IntoResponse {
    Json(state.tasks.list_projects(&identity).await)
}

pub async fn create(
    State(state): State<AppState>,
    Authz(identity): Authz,
    ApiJson(draft): ApiJson<ProjectDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let project = state.tasks.create_project(&identity, draft).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(id): Path<String>,
    ApiJson(draft): ApiJson<ProjectPatchDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Project")?;
    Ok(Json(state.tasks.update_project(&identity, id, draft).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Authz(identity): Authz,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_id(&id, "Project")?;
    let id = state.tasks.delete_project(&identity, id).await?;
    Ok(Json(json!({ "message": "Project removed", "id": id })))
}

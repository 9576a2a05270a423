//! `/api/auth/*` handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::middleware::{ApiJson, Authz};
use crate::api::routes::AppState;
use crate::error::ServiceError;
use crate::user::{LoginDraft, PasswordChangeDraft, ProfilePatch, RegisterDraft};

pub async fn register(
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<RegisterDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.auth.register(draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": session.user,
            "token": session.token,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<LoginDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.auth.login(draft).await?;
    Ok(Json(json!({
        "message": "Login successful",
        "user": session.user,
        "token": session.token,
    })))
}

pub async fn current_user(
    State(state): State<AppState>,
    Authz(identity): Authz,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.auth.current_user(&identity).await?;
    Ok(Json(json!({ "user": user })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Authz(identity): Authz,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.auth.update_profile(&identity, patch).await?;
    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": user,
    })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Authz(identity): Authz,
    ApiJson(draft): ApiJson<PasswordChangeDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    state.auth.change_password(&identity, draft).await?;
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

//! `/api/users/*` handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::{ApiJson, Authz};
use crate::api::routes::AppState;
use crate::error::ServiceError;
use crate::user::{AccountDeletionDraft, PasswordChangeDraft, PreferencesPatch, ProfilePatch};

pub async fn profile(
    State(state): State<AppState>,
    Authz(identity): Authz,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.auth.current_user(&identity).await?))
}

/// Same change as `PUT /api/auth/profile`, answered with the bare user.
pub async fn update_profile(
    State(state): State<AppState>,
    Authz(identity): Authz,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> Result<impl IntoResponse, ServiceError> {
    Ok(Json(state.auth.update_profile(&identity, patch).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesBody {
    #[serde(default)]
    productivity_preferences: PreferencesPatch,
}

pub async fn preferences(
    State(state): State<AppState>,
    Authz(identity): Authz,
    ApiJson(body): ApiJson<PreferencesBody>,
) -> Result<impl IntoResponse, ServiceError> {
    let prefs = state
        .auth
        .update_preferences(&identity, body.productivity_preferences)
        .await?;
    Ok(Json(prefs))
}

pub async fn stats(State(state): State<AppState>, Authz(identity): Authz) -> impl IntoResponse {
    Json(state.auth.stats(&identity).await)
}

pub async fn change_password(
    State(state): State<AppState>,
    Authz(identity): Authz,
    ApiJson(draft): ApiJson<PasswordChangeDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    state.auth.change_password(&identity, draft).await?;
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Authz(identity): Authz,
    ApiJson(draft): ApiJson<AccountDeletionDraft>,
) -> Result<impl IntoResponse, ServiceError> {
    state.auth.delete_account(&identity, draft).await?;
    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

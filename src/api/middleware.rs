//! Bearer-token authentication for protected routes, plus the request extractors
//! shared by the handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::routes::AppState;
use crate::auth::Identity;
use crate::error::ServiceError;

/// Verify `Authorization: Bearer <token>` and attach the resolved `Identity` to
/// the request. Anything else is `Unauthenticated`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            tracing::debug!(path = %req.uri().path(), "Missing bearer token");
            ServiceError::Unauthenticated
        })?;

    let identity = state.auth.verify_token(&token).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// The caller's identity, as attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct Authz(pub Identity);

impl<S> FromRequestParts<S> for Authz
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Authz)
            .ok_or(ServiceError::Unauthenticated)
    }
}

/// JSON body whose rejection is reported in the service error format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(body_error(rejection)),
        }
    }
}

fn body_error(rejection: JsonRejection) -> ServiceError {
    ServiceError::validation("body", rejection.body_text())
}

/// Path ids that are not UUIDs cannot name anything, so they are `NotFound`.
pub fn parse_id(raw: &str, kind: &'static str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::NotFound(kind))
}

//! REST surface: application state and the route table.

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde_json::json;

use crate::api::handlers::{auth, events, projects, tasks, users};
use crate::api::middleware::require_auth;
use crate::auth::AuthService;
use crate::db::Store;
use crate::error::ServiceError;
use crate::events::BroadcastSink;
use crate::service::TaskService;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub tasks: Arc<TaskService>,
    pub events: BroadcastSink,
}

impl AppState {
    /// Wire the services around one shared store and one event channel.
    pub fn new(store: Arc<Store>, auth: AuthService) -> Self {
        let events = BroadcastSink::default();
        let tasks = TaskService::new(store, Arc::new(events.clone()));
        Self {
            auth: Arc::new(auth),
            tasks: Arc::new(tasks),
            events,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api", get(index))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    let protected = Router::new()
        .route("/api/auth/user", get(auth::current_user))
        .route("/api/auth/profile", put(auth::update_profile))
        .route("/api/auth/password", put(auth::change_password))
        .route("/api/users/profile", get(users::profile).put(users::update_profile))
        .route("/api/users/password", put(users::change_password))
        .route("/api/users/preferences", put(users::preferences))
        .route("/api/users/stats", get(users::stats))
        .route("/api/users/account", delete(users::delete_account))
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route("/api/tasks/due-soon", get(tasks::due_soon))
        .route("/api/tasks/status/{status}", get(tasks::by_status))
        .route("/api/tasks/project/{project_id}", get(tasks::by_project))
        .route(
            "/api/tasks/{id}",
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        .route("/api/tasks/{id}/toggle-complete", patch(tasks::toggle_complete))
        .route("/api/tasks/{id}/subtask", post(tasks::add_subtask))
        .route(
            "/api/tasks/{id}/subtask/{subtask_id}",
            put(tasks::toggle_subtask),
        )
        .route("/api/projects", get(projects::list).post(projects::create))
        .route(
            "/api/projects/{id}",
            put(projects::update).delete(projects::delete),
        )
        .route("/api/events", get(events::stream))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    public
        .merge(protected)
        .fallback(fallback)
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to the Task Management API" }))
}

async fn fallback() -> ServiceError {
    ServiceError::NotFound("Route")
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::tests::test_auth;

    fn app() -> Router {
        let store = Arc::new(Store::in_memory());
        router(AppState::new(store.clone(), test_auth(store)))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn register(app: &Router, name: &str, email: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": name, "email": email, "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn alice_and_bob() {
        let app = app();
        register(&app, "Alice", "alice@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["user"].get("passwordHash").is_none());
        let alice = body["token"].as_str().unwrap().to_string();

        let (status, task) = call(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&alice),
            Some(json!({ "title": "Ship release", "priority": "high" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["status"], "todo");
        assert_eq!(task["priority"], "high");
        let id = task["id"].as_str().unwrap().to_string();

        let (status, toggled) = call(
            &app,
            Method::PATCH,
            &format!("/api/tasks/{id}/toggle-complete"),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toggled["status"], "done");

        let bob = register(&app, "Bob", "bob@example.com").await;
        let (status, body) = call(&app, Method::GET, &format!("/api/tasks/{id}"), Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/tasks", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthenticated");

        let (status, _) = call(&app, Method::GET, "/api/tasks", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, Method::GET, "/api", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn error_statuses() {
        let app = app();
        let token = register(&app, "Carol", "carol@example.com").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Carol", "email": "CAROL@example.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "duplicate_identity");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "carol@example.com", "password": "wrong-one" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid credentials");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({ "title": "x", "status": "blocked" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "status");

        let (status, _) = call(&app, Method::GET, "/api/tasks/not-a-uuid", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let missing = uuid::Uuid::new_v4();
        let (status, body) = call(
            &app,
            Method::DELETE,
            &format!("/api/tasks/{missing}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Task not found");

        let (status, _) = call(&app, Method::GET, "/api/tasks/status/archived", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn subtasks_and_clearing_fields() {
        let app = app();
        let token = register(&app, "Dan", "dan@example.com").await;

        let (_, task) = call(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({ "title": "Parent", "description": "d", "dueDate": "2030-01-01" })),
        )
        .await;
        let id = task["id"].as_str().unwrap().to_string();

        let (status, task) = call(
            &app,
            Method::POST,
            &format!("/api/tasks/{id}/subtask"),
            Some(&token),
            Some(json!({ "title": "Child" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let sub = task["subtasks"][0]["id"].as_str().unwrap().to_string();

        let (status, task) = call(
            &app,
            Method::PUT,
            &format!("/api/tasks/{id}/subtask/{sub}"),
            Some(&token),
            Some(json!({ "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["subtasks"][0]["completed"], true);
        assert_eq!(task["subtasks"][0]["title"], "Child");

        let (status, task) = call(
            &app,
            Method::PUT,
            &format!("/api/tasks/{id}"),
            Some(&token),
            Some(json!({ "description": null, "dueDate": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(task.get("description").is_none());
        assert!(task.get("dueDate").is_none());
        assert_eq!(task["title"], "Parent");
        assert_eq!(task["subtasks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn user_routes() {
        let app = app();
        let token = register(&app, "Eve", "eve@example.com").await;

        let (status, prefs) = call(
            &app,
            Method::PUT,
            "/api/users/preferences",
            Some(&token),
            Some(json!({ "productivityPreferences": { "workHoursStart": "08:30" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prefs["workHoursStart"], "08:30");
        assert_eq!(prefs["workHoursEnd"], "17:00");

        call(&app, Method::POST, "/api/tasks", Some(&token), Some(json!({ "title": "One" }))).await;
        let (status, stats) = call(&app, Method::GET, "/api/users/stats", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["todo"], 1);

        let (status, user) = call(
            &app,
            Method::PUT,
            "/api/users/profile",
            Some(&token),
            Some(json!({ "name": "Eve Adams" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["name"], "Eve Adams");
        assert_eq!(user["productivityPreferences"]["workHoursStart"], "08:30");

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/users/password",
            Some(&token),
            Some(json!({ "currentPassword": "wrong-one", "newPassword": "secret2" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_credentials");

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/users/password",
            Some(&token),
            Some(json!({ "currentPassword": "secret1", "newPassword": "secret2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "eve@example.com", "password": "secret2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &app,
            Method::DELETE,
            "/api/users/account",
            Some(&token),
            Some(json!({ "password": "secret2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, Method::GET, "/api/users/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tasks_by_project() {
        let app = app();
        let token = register(&app, "Gus", "gus@example.com").await;
        let (status, project) = call(
            &app,
            Method::POST,
            "/api/projects",
            Some(&token),
            Some(json!({ "name": "Website" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let project = project["id"].as_str().unwrap().to_string();

        call(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({ "title": "Fix footer", "project": project })),
        )
        .await;
        call(&app, Method::POST, "/api/tasks", Some(&token), Some(json!({ "title": "Loose" }))).await;

        let (status, tasks) = call(
            &app,
            Method::GET,
            &format!("/api/tasks/project/{project}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let tasks = tasks.as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["title"], "Fix footer");

        let (status, _) = call(&app, Method::GET, "/api/tasks/project/nope", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn event_stream_is_protected() {
        let app = app();
        let (status, _) = call(&app, Method::GET, "/api/events", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = register(&app, "Fay", "fay@example.com").await;
        let request = Request::builder()
            .uri("/api/events")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
    }

    #[tokio::test]
    async fn event_stream_only_carries_own_tasks() {
        use tokio_stream::StreamExt;

        let app = app();
        let alice = register(&app, "Alice", "alice@example.com").await;
        let bob = register(&app, "Bob", "bob@example.com").await;

        let request = Request::builder()
            .uri("/api/events")
            .header(header::AUTHORIZATION, format!("Bearer {bob}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let mut frames = response.into_body().into_data_stream();

        call(&app, Method::POST, "/api/tasks", Some(&alice), Some(json!({ "title": "Alice card" }))).await;
        call(&app, Method::POST, "/api/tasks", Some(&bob), Some(json!({ "title": "Bob card" }))).await;

        let mut received = String::new();
        while !received.contains("Bob card") {
            let frame = tokio::time::timeout(std::time::Duration::from_secs(5), frames.next())
                .await
                .expect("event within timeout")
                .expect("stream still open")
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&frame));
        }
        assert!(received.contains("task:created"));
        assert!(!received.contains("Alice card"));
    }
}

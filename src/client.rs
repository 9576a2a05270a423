//! Blocking HTTP client for the task board REST API.
//!
//! Used by the command-line commands directly and by the board from worker
//! threads. Non-2xx responses are mapped back into `ClientError::Api` carrying
//! the server's error code and message.

use std::io::{BufRead, BufReader};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::AuthSession;
use crate::events::TaskEvent;
use crate::fields::Status;
use crate::project::{Project, ProjectDraft, ProjectPatchDraft};
use crate::session::Session;
use crate::task::*;
use crate::user::*;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("cannot reach server: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("not logged in; run `tb login` first")]
    NotLoggedIn,
}

impl ClientError {
    /// The server no longer accepts our token (or we never had one).
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ClientError::NotLoggedIn)
            || matches!(self, ClientError::Api { status: 401, .. })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

impl From<ureq::Error> for ClientError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let body: Option<ErrorBody> = response.into_json().ok();
                let (code, message) = match body {
                    Some(b) => (b.error, b.message),
                    None => (String::from("unknown"), format!("HTTP {status}")),
                };
                ClientError::Api {
                    status,
                    code,
                    message,
                }
            }
            ureq::Error::Transport(t) => ClientError::Transport(t.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: PublicUser,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base: impl Into<String>, token: Option<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            base,
            token,
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn from_session(session: &Session) -> Self {
        Self::new(session.server.clone(), session.token.clone())
    }

    fn request(&self, method: &str, path: &str, authed: bool) -> Result<ureq::Request, ClientError> {
        let req = self.agent.request(method, &format!("{}{}", self.base, path));
        if !authed {
            return Ok(req);
        }
        match &self.token {
            Some(token) => Ok(req.set("Authorization", &format!("Bearer {token}"))),
            None => Err(ClientError::NotLoggedIn),
        }
    }

    fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, ClientError> {
        response
            .into_json()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.request("GET", path, true)?.call()?;
        Self::decode(response)
    }

    fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.request(method, path, true)?.send_json(body)?;
        Self::decode(response)
    }

    fn empty<T: DeserializeOwned>(&self, method: &str, path: &str) -> Result<T, ClientError> {
        let response = self.request(method, path, true)?.call()?;
        Self::decode(response)
    }

    // Auth

    pub fn register(&self, draft: &RegisterDraft) -> Result<AuthSession, ClientError> {
        let response = self.request("POST", "/api/auth/register", false)?.send_json(draft)?;
        Self::decode(response)
    }

    pub fn login(&self, draft: &LoginDraft) -> Result<AuthSession, ClientError> {
        let response = self.request("POST", "/api/auth/login", false)?.send_json(draft)?;
        Self::decode(response)
    }

    pub fn current_user(&self) -> Result<PublicUser, ClientError> {
        self.get::<UserEnvelope>("/api/auth/user").map(|e| e.user)
    }

    pub fn update_profile(&self, patch: &ProfilePatch) -> Result<PublicUser, ClientError> {
        self.send::<_, UserEnvelope>("PUT", "/api/auth/profile", patch)
            .map(|e| e.user)
    }

    pub fn change_password(&self, draft: &PasswordChangeDraft) -> Result<(), ClientError> {
        self.send::<_, Value>("PUT", "/api/auth/password", draft)
            .map(|_| ())
    }

    pub fn update_preferences(
        &self,
        patch: &PreferencesPatch,
    ) -> Result<ProductivityPreferences, ClientError> {
        self.send(
            "PUT",
            "/api/users/preferences",
            &json!({ "productivityPreferences": patch }),
        )
    }

    pub fn stats(&self) -> Result<UserStats, ClientError> {
        self.get("/api/users/stats")
    }

    pub fn delete_account(&self, draft: &AccountDeletionDraft) -> Result<(), ClientError> {
        self.send::<_, Value>("DELETE", "/api/users/account", draft)
            .map(|_| ())
    }

    // Tasks

    pub fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, ClientError> {
        let mut req = self.request("GET", "/api/tasks", true)?;
        for (key, value) in [
            ("status", &query.status),
            ("priority", &query.priority),
            ("project", &query.project),
        ] {
            if let Some(value) = value {
                req = req.query(key, value);
            }
        }
        Self::decode(req.call()?)
    }

    pub fn due_soon(&self) -> Result<Vec<Task>, ClientError> {
        self.get("/api/tasks/due-soon")
    }

    pub fn tasks_by_status(&self, status: Status) -> Result<Vec<Task>, ClientError> {
        self.get(&format!("/api/tasks/status/{status}"))
    }

    pub fn get_task(&self, id: Uuid) -> Result<Task, ClientError> {
        self.get(&format!("/api/tasks/{id}"))
    }

    pub fn create_task(&self, draft: &TaskDraft) -> Result<Task, ClientError> {
        self.send("POST", "/api/tasks", draft)
    }

    pub fn update_task(&self, id: Uuid, patch: &TaskPatchDraft) -> Result<Task, ClientError> {
        self.send("PUT", &format!("/api/tasks/{id}"), patch)
    }

    pub fn delete_task(&self, id: Uuid) -> Result<(), ClientError> {
        self.empty::<Value>("DELETE", &format!("/api/tasks/{id}"))
            .map(|_| ())
    }

    pub fn toggle_complete(&self, id: Uuid) -> Result<Task, ClientError> {
        self.empty("PATCH", &format!("/api/tasks/{id}/toggle-complete"))
    }

    pub fn add_subtask(&self, id: Uuid, title: &str) -> Result<Task, ClientError> {
        self.send(
            "POST",
            &format!("/api/tasks/{id}/subtask"),
            &json!({ "title": title }),
        )
    }

    pub fn set_subtask(
        &self,
        id: Uuid,
        subtask: Uuid,
        patch: &SubtaskPatch,
    ) -> Result<Task, ClientError> {
        self.send("PUT", &format!("/api/tasks/{id}/subtask/{subtask}"), patch)
    }

    // Projects

    pub fn list_projects(&self) -> Result<Vec<Project>, ClientError> {
        self.get("/api/projects")
    }

    pub fn create_project(&self, draft: &ProjectDraft) -> Result<Project, ClientError> {
        self.send("POST", "/api/projects", draft)
    }

    pub fn update_project(
        &self,
        id: Uuid,
        patch: &ProjectPatchDraft,
    ) -> Result<Project, ClientError> {
        self.send("PUT", &format!("/api/projects/{id}"), patch)
    }

    pub fn delete_project(&self, id: Uuid) -> Result<(), ClientError> {
        self.empty::<Value>("DELETE", &format!("/api/projects/{id}"))
            .map(|_| ())
    }

    /// Open the push channel. Blocks on each read; meant for a dedicated thread.
    pub fn events(&self) -> Result<impl Iterator<Item = TaskEvent>, ClientError> {
        let response = self
            .request("GET", "/api/events", true)?
            .set("Accept", "text/event-stream")
            .call()?;
        let reader = BufReader::new(response.into_reader());
        Ok(SseReader::new(reader)
            .map_while(Result::ok)
            .filter_map(|(name, data)| TaskEvent::from_wire(&name, &data)))
    }
}

/// Minimal `text/event-stream` reader yielding `(event name, data)` pairs.
pub struct SseReader<R> {
    inner: R,
}

impl<R: BufRead> SseReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: BufRead> Iterator for SseReader<R> {
    type Item = std::io::Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut name = String::new();
        let mut data: Vec<String> = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match self.inner.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if data.is_empty() {
                    // Keep-alive or comment-only block.
                    name.clear();
                    continue;
                }
                let name = if name.is_empty() { "message".to_string() } else { name };
                return Some(Ok((name, data.join("\n"))));
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => name = value.to_string(),
                "data" => data.push(value.to_string()),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_frames_are_split_on_blank_lines() {
        let raw = ": keep-alive\n\nevent: task:deleted\ndata: {\"id\":\"a\"}\n\nevent: task:updated\ndata: line1\ndata: line2\n\n";
        let frames: Vec<_> = SseReader::new(raw.as_bytes())
            .map(Result::unwrap)
            .collect();
        assert_eq!(
            frames,
            vec![
                ("task:deleted".to_string(), "{\"id\":\"a\"}".to_string()),
                ("task:updated".to_string(), "line1\nline2".to_string()),
            ]
        );
    }

    #[test]
    fn unauthenticated_classification() {
        let api = ClientError::Api {
            status: 401,
            code: "unauthenticated".into(),
            message: "Authentication required".into(),
        };
        assert!(api.is_unauthenticated());
        assert!(ClientError::NotLoggedIn.is_unauthenticated());
        let forbidden = ClientError::Api {
            status: 403,
            code: "forbidden".into(),
            message: "Not authorized".into(),
        };
        assert!(!forbidden.is_unauthenticated());
    }

    #[test]
    fn authed_request_without_token_fails_early() {
        let client = ApiClient::new("http://127.0.0.1:9", None);
        assert!(matches!(client.stats(), Err(ClientError::NotLoggedIn)));
    }
}

//! Task data structure and related functionality.
//!
//! This module defines the `Task` document with its embedded subtasks, the raw
//! drafts accepted over the wire, and the validated `NewTask` / `TaskPatch` values
//! the task service works with.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::fields::*;
use crate::validate::{double_option, Violations, DESCRIPTION_MAX, TITLE_MAX};

/// A work item owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub owner: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Uuid>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A checklist entry living inside its parent task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(title: String, completed: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            completed,
            created_at: now,
        }
    }
}

impl Task {
    /// Build a fresh task owned by `owner` from validated input.
    pub fn create(owner: Uuid, input: NewTask, now: DateTime<Utc>) -> Self {
        let subtasks = input
            .subtasks
            .into_iter()
            .map(|s| Subtask::new(s.title, s.completed, now))
            .collect();
        Self {
            id: Uuid::new_v4(),
            owner,
            title: input.title,
            description: input.description,
            status: input.status,
            priority: input.priority,
            due_date: input.due_date,
            project: input.project,
            subtasks,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch. Fields the patch leaves as `None` are untouched.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(project) = patch.project {
            self.project = project;
        }
        if let Some(replacement) = patch.subtasks {
            let previous = std::mem::take(&mut self.subtasks);
            let mut claimed = HashSet::new();
            self.subtasks = replacement
                .into_iter()
                .map(|s| {
                    let known = s
                        .id
                        .filter(|id| claimed.insert(*id))
                        .and_then(|id| previous.iter().find(|p| p.id == id));
                    (s, known)
                })
                .map(|(s, known)| match known {
                    Some(kept) => Subtask {
                        title: s.title,
                        completed: s.completed,
                        ..kept.clone()
                    },
                    None => Subtask::new(s.title, s.completed, now),
                })
                .collect();
        }
        self.updated_at = now;
    }

    pub fn subtask_mut(&mut self, id: Uuid) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == id)
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|s| s.completed).count()
    }
}

/// Validated input for task creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub project: Option<Uuid>,
    pub subtasks: Vec<NewSubtask>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSubtask {
    pub id: Option<Uuid>,
    pub title: String,
    pub completed: bool,
}

/// Validated partial update. The outer `Option` means "field supplied".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub project: Option<Option<Uuid>>,
    pub subtasks: Option<Vec<NewSubtask>>,
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Subtask changes for `PUT /api/tasks/:id/subtask/:subtaskId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SubtaskPatch {
    pub fn validate(self) -> Result<SubtaskPatch, ServiceError> {
        let mut v = Violations::default();
        let title = self
            .title
            .and_then(|t| v.required_text("title", Some(t), Some(TITLE_MAX), "Subtask title cannot be empty"));
        v.finish()?;
        Ok(SubtaskPatch {
            completed: self.completed,
            title,
        })
    }
}

/// Raw creation payload as received over the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<SubtaskDraft>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Raw partial update. `null` on a clearable field means "clear it".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatchDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub project: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<SubtaskDraft>>,
}

const STATUS_MESSAGE: &str = "Status must be one of todo, in-progress, done";
const PRIORITY_MESSAGE: &str = "Priority must be one of low, medium, high";

fn check_subtasks(v: &mut Violations, drafts: Vec<SubtaskDraft>) -> Vec<NewSubtask> {
    let mut out = Vec::with_capacity(drafts.len());
    let mut seen = HashSet::new();
    for (i, draft) in drafts.into_iter().enumerate() {
        let field = format!("subtasks[{i}].title");
        let title = v.required_text(&field, draft.title, Some(TITLE_MAX), "Subtask title is required");
        let id_field = format!("subtasks[{i}].id");
        let id = draft.id.and_then(|raw| v.reference(&id_field, &raw));
        if let Some(id) = id {
            v.check(seen.insert(id), &id_field, "Subtask id appears more than once");
        }
        if let Some(title) = title {
            out.push(NewSubtask {
                id,
                title,
                completed: draft.completed,
            });
        }
    }
    out
}

impl TaskDraft {
    pub fn validate(self) -> Result<NewTask, ServiceError> {
        let mut v = Violations::default();
        let title = v.required_text("title", self.title, Some(TITLE_MAX), "Title is required");
        let description = self
            .description
            .and_then(|d| v.bounded("description", d, Some(DESCRIPTION_MAX)));
        let status = match self.status {
            Some(raw) => v.parse_enum("status", &raw, STATUS_MESSAGE),
            None => Some(Status::default()),
        };
        let priority = match self.priority {
            Some(raw) => v.parse_enum("priority", &raw, PRIORITY_MESSAGE),
            None => Some(Priority::default()),
        };
        let due_date = self.due_date.and_then(|raw| v.due_date("dueDate", &raw));
        let project = self.project.and_then(|raw| v.reference("project", &raw));
        let subtasks = check_subtasks(&mut v, self.subtasks);
        v.finish()?;

        Ok(NewTask {
            title: title.unwrap_or_default(),
            description,
            status: status.unwrap_or_default(),
            priority: priority.unwrap_or_default(),
            due_date,
            project,
            subtasks,
        })
    }
}

impl TaskPatchDraft {
    pub fn validate(self) -> Result<TaskPatch, ServiceError> {
        let mut v = Violations::default();
        let title = self
            .title
            .and_then(|t| v.required_text("title", Some(t), Some(TITLE_MAX), "Title cannot be empty"));
        let description = self.description.map(|d| {
            d.and_then(|d| v.bounded("description", d, Some(DESCRIPTION_MAX)))
        });
        let status = self
            .status
            .and_then(|raw| v.parse_enum("status", &raw, STATUS_MESSAGE));
        let priority = self
            .priority
            .and_then(|raw| v.parse_enum("priority", &raw, PRIORITY_MESSAGE));
        let due_date = self
            .due_date
            .map(|d| d.and_then(|raw| v.due_date("dueDate", &raw)));
        let project = self
            .project
            .map(|p| p.and_then(|raw| v.reference("project", &raw)));
        let subtasks = self.subtasks.map(|s| check_subtasks(&mut v, s));
        v.finish()?;

        Ok(TaskPatch {
            title,
            description,
            status,
            priority,
            due_date,
            project,
            subtasks,
        })
    }
}

/// Equality filters for task listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub project: Option<Uuid>,
}

impl TaskQuery {
    pub fn validate(self) -> Result<TaskFilter, ServiceError> {
        let mut v = Violations::default();
        let status = self
            .status
            .and_then(|raw| v.parse_enum("status", &raw, STATUS_MESSAGE));
        let priority = self
            .priority
            .and_then(|raw| v.parse_enum("priority", &raw, PRIORITY_MESSAGE));
        let project = self.project.and_then(|raw| v.reference("project", &raw));
        v.finish()?;
        Ok(TaskFilter {
            status,
            priority,
            project,
        })
    }
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == p)
            && self.project.map_or(true, |p| task.project == Some(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: Some(title.to_string()),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn creation_defaults() {
        let new = draft("Ship release").validate().unwrap();
        assert_eq!(new.status, Status::Todo);
        assert_eq!(new.priority, Priority::Medium);
        assert!(new.subtasks.is_empty());
    }

    #[test]
    fn creation_rejects_unknown_enums_with_field_detail() {
        let mut d = draft("x");
        d.status = Some("backlog".into());
        d.priority = Some("urgent".into());
        match d.validate() {
            Err(ServiceError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["status", "priority"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn description_limit() {
        let mut d = draft("x");
        d.description = Some("d".repeat(1001));
        assert!(d.validate().is_err());
        let mut d = draft("x");
        d.description = Some("d".repeat(1000));
        assert!(d.validate().is_ok());
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let absent: TaskPatchDraft = serde_json::from_str(r#"{"title":"t"}"#).unwrap();
        assert_eq!(absent.description, None);
        let cleared: TaskPatchDraft = serde_json::from_str(r#"{"description":null,"dueDate":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert_eq!(cleared.due_date, Some(None));

        let patch = cleared.validate().unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.title, None);
    }

    #[test]
    fn apply_only_touches_supplied_fields() {
        let now = Utc::now();
        let mut new = draft("Write docs").validate().unwrap();
        new.priority = Priority::High;
        new.due_date = NaiveDate::from_ymd_opt(2030, 1, 1);
        let mut task = Task::create(Uuid::new_v4(), new, now);
        let before = task.clone();

        let patch: TaskPatchDraft = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        task.apply(patch.validate().unwrap(), now);

        assert_eq!(task.description.as_deref(), Some("x"));
        assert_eq!(task.title, before.title);
        assert_eq!(task.status, before.status);
        assert_eq!(task.priority, before.priority);
        assert_eq!(task.due_date, before.due_date);
    }

    #[test]
    fn subtask_replacement_keeps_known_ids() {
        let now = Utc::now();
        let mut new = draft("Parent").validate().unwrap();
        new.subtasks = vec![NewSubtask { id: None, title: "a".into(), completed: false }];
        let mut task = Task::create(Uuid::new_v4(), new, now);
        let kept = task.subtasks[0].clone();

        task.apply(
            TaskPatch {
                subtasks: Some(vec![
                    NewSubtask { id: Some(kept.id), title: "a2".into(), completed: true },
                    NewSubtask { id: None, title: "b".into(), completed: false },
                ]),
                ..TaskPatch::default()
            },
            now,
        );

        assert_eq!(task.subtasks.len(), 2);
        assert_eq!(task.subtasks[0].id, kept.id);
        assert_eq!(task.subtasks[0].created_at, kept.created_at);
        assert!(task.subtasks[0].completed);
        assert_ne!(task.subtasks[1].id, kept.id);
    }

    #[test]
    fn repeated_subtask_id_is_rejected() {
        let id = Uuid::new_v4();
        let patch: TaskPatchDraft = serde_json::from_value(serde_json::json!({
            "subtasks": [{ "id": id.to_string(), "title": "x" }, { "id": id.to_string(), "title": "y" }]
        }))
        .unwrap();
        match patch.validate() {
            Err(ServiceError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "subtasks[1].id");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn replacement_never_shares_an_id() {
        let now = Utc::now();
        let mut new = draft("Parent").validate().unwrap();
        new.subtasks = vec![NewSubtask { id: None, title: "a".into(), completed: false }];
        let mut task = Task::create(Uuid::new_v4(), new, now);
        let known = task.subtasks[0].id;

        task.apply(
            TaskPatch {
                subtasks: Some(vec![
                    NewSubtask { id: Some(known), title: "x".into(), completed: false },
                    NewSubtask { id: Some(known), title: "y".into(), completed: true },
                ]),
                ..TaskPatch::default()
            },
            now,
        );

        assert_eq!(task.subtasks[0].id, known);
        let second = task.subtasks[1].id;
        assert_ne!(second, known);
        assert_eq!(task.subtask_mut(second).map(|s| s.title.as_str()), Some("y"));
    }

    #[test]
    fn wire_format_is_camel_case() {
        let task = Task::create(Uuid::new_v4(), draft("x").validate().unwrap(), Utc::now());
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("user").is_some());
        assert_eq!(json["status"], "todo");
    }
}

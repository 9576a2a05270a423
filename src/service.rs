//! Task and project operations, scoped to the calling identity.
//!
//! Every operation takes a verified `Identity`. Reads and writes of a single
//! document go through the ownership guard, so a missing document is `NotFound`
//! and someone else's is `Forbidden`. Task mutations emit a `TaskEvent` once the
//! store has committed.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::auth::Identity;
use crate::db::Store;
use crate::error::ServiceError;
use crate::events::{EventSink, TaskEvent};
use crate::fields::Status;
use crate::guard::{authorize, authorize_mut};
use crate::project::{Project, ProjectDraft, ProjectPatchDraft};
use crate::task::*;
use crate::validate::{Violations, TITLE_MAX};

/// Days ahead (inclusive of today) that count as "due soon".
pub const DUE_SOON_DAYS: i64 = 3;

/// Listing order: due date ascending with undated tasks last, then newest first.
pub fn task_order(a: &Task, b: &Task) -> Ordering {
    let by_due = match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_due.then_with(|| b.created_at.cmp(&a.created_at))
}

pub struct TaskService {
    store: Arc<Store>,
    events: Arc<dyn EventSink>,
}

impl TaskService {
    pub fn new(store: Arc<Store>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    async fn owned_tasks(&self, identity: &Identity, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .store
            .read(|db| {
                db.tasks
                    .iter()
                    .filter(|t| t.owner == identity.user_id && keep(t))
                    .cloned()
                    .collect()
            })
            .await;
        tasks.sort_by(task_order);
        tasks
    }

    #[instrument(skip(self, identity), fields(user = %identity.user_id))]
    pub async fn list(&self, identity: &Identity, query: TaskQuery) -> Result<Vec<Task>, ServiceError> {
        let filter = query.validate()?;
        let tasks = self.owned_tasks(identity, |t| filter.matches(t)).await;
        debug!(count = tasks.len(), "Listed tasks");
        Ok(tasks)
    }

    /// Tasks in one status column; the status is parsed from a path segment.
    pub async fn list_by_status(&self, identity: &Identity, raw: &str) -> Result<Vec<Task>, ServiceError> {
        self.list(
            identity,
            TaskQuery {
                status: Some(raw.to_string()),
                ..TaskQuery::default()
            },
        )
        .await
    }

    /// Tasks filed under one project. The project itself need not exist.
    pub async fn list_by_project(&self, identity: &Identity, project: Uuid) -> Vec<Task> {
        self.owned_tasks(identity, |t| t.project == Some(project)).await
    }

    /// Open tasks due between today and `DUE_SOON_DAYS` from now.
    pub async fn due_soon(&self, identity: &Identity) -> Vec<Task> {
        let today = Utc::now().date_naive();
        let horizon = today + Duration::days(DUE_SOON_DAYS);
        self.owned_tasks(identity, |t| {
            t.status != Status::Done && t.due_date.is_some_and(|d| d >= today && d <= horizon)
        })
        .await
    }

    pub async fn get(&self, identity: &Identity, id: Uuid) -> Result<Task, ServiceError> {
        self.store
            .read(|db| authorize(identity, || db.task(id)).cloned())
            .await
    }

    #[instrument(skip(self, identity, draft), fields(user = %identity.user_id))]
    pub async fn create(&self, identity: &Identity, draft: TaskDraft) -> Result<Task, ServiceError> {
        let input = draft.validate()?;
        let task = Task::create(identity.user_id, input, Utc::now());
        let task = self
            .store
            .write(|db| {
                db.tasks.push(task.clone());
                Ok::<_, ServiceError>(task)
            })
            .await?;
        info!(task = %task.id, "Task created");
        self.events.emit(TaskEvent::Created(task.clone()));
        Ok(task)
    }

    /// Apply `change` to an owned task under the write lock, then emit `updated`.
    async fn mutate(
        &self,
        identity: &Identity,
        id: Uuid,
        change: impl FnOnce(&mut Task) -> Result<(), ServiceError>,
    ) -> Result<Task, ServiceError> {
        let task = self
            .store
            .write(|db| {
                let task = authorize_mut(identity, move || db.task_mut(id))?;
                change(task)?;
                Ok::<_, ServiceError>(task.clone())
            })
            .await?;
        self.events.emit(TaskEvent::Updated(task.clone()));
        Ok(task)
    }

    #[instrument(skip(self, identity, draft), fields(user = %identity.user_id))]
    pub async fn update(
        &self,
        identity: &Identity,
        id: Uuid,
        draft: TaskPatchDraft,
    ) -> Result<Task, ServiceError> {
        let patch = draft.validate()?;
        let task = self
            .mutate(identity, id, |task| {
                task.apply(patch, Utc::now());
                Ok(())
            })
            .await?;
        debug!(status = %task.status, "Task updated");
        Ok(task)
    }

    #[instrument(skip(self, identity), fields(user = %identity.user_id))]
    pub async fn delete(&self, identity: &Identity, id: Uuid) -> Result<Uuid, ServiceError> {
        self.store
            .write(|db| {
                authorize(identity, || db.task(id))?;
                db.tasks.retain(|t| t.id != id);
                Ok::<_, ServiceError>(())
            })
            .await?;
        info!("Task deleted");
        self.events.emit(TaskEvent::Deleted {
            id,
            owner: identity.user_id,
        });
        Ok(id)
    }

    /// `done` goes back to `todo`; any other status becomes `done`.
    #[instrument(skip(self, identity), fields(user = %identity.user_id))]
    pub async fn toggle_complete(&self, identity: &Identity, id: Uuid) -> Result<Task, ServiceError> {
        self.mutate(identity, id, |task| {
            task.status = task.status.toggled();
            task.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, identity, draft), fields(user = %identity.user_id))]
    pub async fn add_subtask(
        &self,
        identity: &Identity,
        id: Uuid,
        draft: SubtaskDraft,
    ) -> Result<Task, ServiceError> {
        let mut v = Violations::default();
        let title = v.required_text("title", draft.title, Some(TITLE_MAX), "Subtask title is required");
        v.finish()?;
        let title = title.unwrap_or_default();

        self.mutate(identity, id, |task| {
            let now = Utc::now();
            task.subtasks.push(Subtask::new(title, false, now));
            task.updated_at = now;
            Ok(())
        })
        .await
    }

    /// Set a subtask's completion (not a flip) and optionally rename it.
    #[instrument(skip(self, identity, patch), fields(user = %identity.user_id))]
    pub async fn toggle_subtask(
        &self,
        identity: &Identity,
        id: Uuid,
        subtask_id: Uuid,
        patch: SubtaskPatch,
    ) -> Result<Task, ServiceError> {
        let patch = patch.validate()?;
        self.mutate(identity, id, |task| {
            let subtask = task
                .subtask_mut(subtask_id)
                .ok_or(ServiceError::NotFound("Subtask"))?;
            if let Some(completed) = patch.completed {
                subtask.completed = completed;
            }
            if let Some(title) = patch.title {
                subtask.title = title;
            }
            task.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    pub async fn list_projects(&self, identity: &Identity) -> Vec<Project> {
        let mut projects: Vec<Project> = self
            .store
            .read(|db| {
                db.projects
                    .iter()
                    .filter(|p| p.owner == identity.user_id)
                    .cloned()
                    .collect()
            })
            .await;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }

    #[instrument(skip(self, identity, draft), fields(user = %identity.user_id))]
    pub async fn create_project(
        &self,
        identity: &Identity,
        draft: ProjectDraft,
    ) -> Result<Project, ServiceError> {
        let project = Project::create(identity.user_id, draft.validate()?, Utc::now());
        let project = self
            .store
            .write(|db| {
                db.projects.push(project.clone());
                Ok::<_, ServiceError>(project)
            })
            .await?;
        info!(project = %project.id, "Project created");
        Ok(project)
    }

    pub async fn update_project(
        &self,
        identity: &Identity,
        id: Uuid,
        draft: ProjectPatchDraft,
    ) -> Result<Project, ServiceError> {
        let patch = draft.validate()?;
        self.store
            .write(|db| {
                let project = authorize_mut(identity, move || db.project_mut(id))?;
                project.apply(patch);
                Ok(project.clone())
            })
            .await
    }

    /// Referencing tasks keep their (now dangling) project id.
    pub async fn delete_project(&self, identity: &Identity, id: Uuid) -> Result<Uuid, ServiceError> {
        self.store
            .write(|db| {
                authorize(identity, || db.project(id))?;
                db.projects.retain(|p| p.id != id);
                Ok::<_, ServiceError>(())
            })
            .await?;
        info!(project = %id, "Project deleted");
        Ok(id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::fields::{Priority, Role};

    #[derive(Default)]
    pub(crate) struct RecordingSink(pub Mutex<Vec<TaskEvent>>);

    impl EventSink for RecordingSink {
        fn emit(&self, event: TaskEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".into(),
            role: Role::User,
        }
    }

    fn service() -> (TaskService, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (TaskService::new(Arc::new(Store::in_memory()), sink.clone()), sink)
    }

    fn titled(title: &str) -> TaskDraft {
        TaskDraft {
            title: Some(title.into()),
            ..TaskDraft::default()
        }
    }

    fn due(title: &str, date: &str) -> TaskDraft {
        TaskDraft {
            due_date: Some(date.into()),
            ..titled(title)
        }
    }

    #[tokio::test]
    async fn title_boundary() {
        let (svc, _) = service();
        let me = identity();
        assert!(svc.create(&me, titled(&"x".repeat(100))).await.is_ok());
        assert!(matches!(
            svc.create(&me, titled(&"x".repeat(101))).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.create(&me, titled("   ")).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn non_owner_is_forbidden_and_missing_is_not_found() {
        let (svc, _) = service();
        let alice = identity();
        let bob = identity();
        let task = svc.create(&alice, titled("Private")).await.unwrap();

        assert!(matches!(svc.get(&bob, task.id).await, Err(ServiceError::Forbidden)));
        assert!(matches!(
            svc.update(&bob, task.id, TaskPatchDraft::default()).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(svc.delete(&bob, task.id).await, Err(ServiceError::Forbidden)));
        assert!(matches!(
            svc.toggle_complete(&bob, task.id).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            svc.get(&alice, Uuid::new_v4()).await,
            Err(ServiceError::NotFound("Task"))
        ));

        assert_eq!(svc.get(&alice, task.id).await.unwrap().title, "Private");
        assert!(svc.list(&bob, TaskQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_complete_is_two_state() {
        let (svc, _) = service();
        let me = identity();
        let draft = TaskDraft {
            status: Some("in-progress".into()),
            ..titled("Toggle me")
        };
        let task = svc.create(&me, draft).await.unwrap();

        let task = svc.toggle_complete(&me, task.id).await.unwrap();
        assert_eq!(task.status, Status::Done);
        let task = svc.toggle_complete(&me, task.id).await.unwrap();
        assert_eq!(task.status, Status::Todo);
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let (svc, _) = service();
        let me = identity();
        let draft = TaskDraft {
            priority: Some("high".into()),
            status: Some("in-progress".into()),
            ..due("Keep me", "2031-05-01")
        };
        let before = svc.create(&me, draft).await.unwrap();

        let patch: TaskPatchDraft = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        let after = svc.update(&me, before.id, patch).await.unwrap();

        assert_eq!(after.description.as_deref(), Some("x"));
        assert_eq!(after.title, before.title);
        assert_eq!(after.status, before.status);
        assert_eq!(after.priority, Priority::High);
        assert_eq!(after.due_date, before.due_date);
    }

    #[tokio::test]
    async fn invalid_status_in_update_is_rejected_and_nothing_changes() {
        let (svc, _) = service();
        let me = identity();
        let task = svc.create(&me, titled("Stable")).await.unwrap();

        let patch: TaskPatchDraft =
            serde_json::from_str(r#"{"title":"Changed","status":"blocked"}"#).unwrap();
        assert!(matches!(
            svc.update(&me, task.id, patch).await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(svc.get(&me, task.id).await.unwrap().title, "Stable");
    }

    #[tokio::test]
    async fn subtask_lifecycle() {
        let (svc, _) = service();
        let me = identity();
        let task = svc.create(&me, titled("Parent")).await.unwrap();

        let task = svc
            .add_subtask(
                &me,
                task.id,
                SubtaskDraft {
                    title: Some("Write tests".into()),
                    ..SubtaskDraft::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(task.subtasks.len(), 1);
        assert!(!task.subtasks[0].completed);

        let sub = task.subtasks[0].id;
        let task = svc
            .toggle_subtask(
                &me,
                task.id,
                sub,
                SubtaskPatch {
                    completed: Some(true),
                    title: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(task.completed_subtasks(), 1);
        assert_eq!(task.subtasks[0].title, "Write tests");

        // Setting, not flipping.
        let task = svc
            .toggle_subtask(&me, task.id, sub, SubtaskPatch { completed: Some(true), title: None })
            .await
            .unwrap();
        assert!(task.subtasks[0].completed);

        assert!(matches!(
            svc.toggle_subtask(&me, task.id, Uuid::new_v4(), SubtaskPatch::default()).await,
            Err(ServiceError::NotFound("Subtask"))
        ));
        assert!(matches!(
            svc.add_subtask(&me, task.id, SubtaskDraft::default()).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn undated_tasks_list_last() {
        let (svc, _) = service();
        let me = identity();
        svc.create(&me, titled("No date")).await.unwrap();
        svc.create(&me, due("Later", "2030-06-01")).await.unwrap();
        svc.create(&me, due("Sooner", "2030-01-01")).await.unwrap();

        let titles: Vec<_> = svc
            .list(&me, TaskQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, ["Sooner", "Later", "No date"]);
    }

    #[tokio::test]
    async fn filters_and_status_listing() {
        let (svc, _) = service();
        let me = identity();
        let done = svc.create(&me, titled("Done one")).await.unwrap();
        svc.toggle_complete(&me, done.id).await.unwrap();
        svc.create(&me, titled("Open one")).await.unwrap();

        let listed = svc.list_by_status(&me, "done").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, done.id);
        assert!(matches!(
            svc.list_by_status(&me, "archived").await,
            Err(ServiceError::Validation(_))
        ));

        let query = TaskQuery {
            priority: Some("medium".into()),
            ..TaskQuery::default()
        };
        assert_eq!(svc.list(&me, query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn due_soon_window() {
        let (svc, _) = service();
        let me = identity();
        let today = Utc::now().date_naive();
        let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();

        svc.create(&me, due("Today", &fmt(today))).await.unwrap();
        svc.create(&me, due("In three", &fmt(today + Duration::days(3)))).await.unwrap();
        svc.create(&me, due("In five", &fmt(today + Duration::days(5)))).await.unwrap();
        svc.create(&me, due("Yesterday", &fmt(today - Duration::days(1)))).await.unwrap();
        let finished = svc.create(&me, due("Finished", &fmt(today))).await.unwrap();
        svc.toggle_complete(&me, finished.id).await.unwrap();

        let titles: Vec<_> = svc.due_soon(&me).await.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, ["Today", "In three"]);
    }

    #[tokio::test]
    async fn events_follow_successful_commits_only() {
        let (svc, sink) = service();
        let me = identity();
        let task = svc.create(&me, titled("Observed")).await.unwrap();
        svc.toggle_complete(&me, task.id).await.unwrap();
        let _ = svc.toggle_complete(&identity(), task.id).await;
        svc.delete(&me, task.id).await.unwrap();

        let names: Vec<_> = sink.0.lock().unwrap().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["task:created", "task:updated", "task:deleted"]);
    }

    #[tokio::test]
    async fn project_crud_is_owner_scoped() {
        let (svc, _) = service();
        let me = identity();
        let other = identity();
        let project = svc
            .create_project(
                &me,
                ProjectDraft {
                    name: Some("Website".into()),
                    ..ProjectDraft::default()
                },
            )
            .await
            .unwrap();

        let draft = TaskDraft {
            project: Some(project.id.to_string()),
            ..titled("In project")
        };
        svc.create(&me, draft).await.unwrap();

        assert!(svc.list_projects(&other).await.is_empty());
        assert!(matches!(
            svc.delete_project(&other, project.id).await,
            Err(ServiceError::Forbidden)
        ));

        let renamed: ProjectPatchDraft = serde_json::from_str(r#"{"name":"Site"}"#).unwrap();
        assert_eq!(svc.update_project(&me, project.id, renamed).await.unwrap().name, "Site");

        svc.delete_project(&me, project.id).await.unwrap();
        let query = TaskQuery {
            project: Some(project.id.to_string()),
            ..TaskQuery::default()
        };
        assert_eq!(svc.list(&me, query).await.unwrap().len(), 1);
    }
}

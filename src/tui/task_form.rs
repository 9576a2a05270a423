//! Task form handling for the terminal user interface.
//!
//! This module provides the `TaskForm` structure used by the board to create
//! and edit tasks. Text fields and selectors share one navigation order; the
//! form produces the same wire drafts the command line sends.

use uuid::Uuid;

use crate::display::{format_priority, format_status, parse_due_input};
use crate::fields::{Priority, Status};
use crate::project::Project;
use crate::task::{Task, TaskDraft, TaskPatchDraft};
use crate::tui::input::InputField;

/// Global order constants for task form fields.
pub const TITLE_GLOBAL_ORDER: usize = 0;
pub const DESCRIPTION_GLOBAL_ORDER: usize = 1;
pub const DUE_GLOBAL_ORDER: usize = 2;
pub const STATUS_GLOBAL_ORDER: usize = 3;
pub const PRIORITY_GLOBAL_ORDER: usize = 4;
pub const PROJECT_SELECTOR_GLOBAL_ORDER: usize = 5;
const FIELD_COUNT: usize = 6;

/// Task form for creating or editing a task.
pub struct TaskForm {
    /// Set when editing an existing task.
    pub editing: Option<Uuid>,
    pub title: InputField,
    pub description: InputField,
    pub due: InputField,
    pub status: usize,
    pub priority: usize,
    /// Index into `projects`; 0 means no project.
    pub project_selector: usize,
    pub current_field: usize,
    pub projects: Vec<(Option<Uuid>, String)>,
    pub priorities: [Priority; 3],
}

impl TaskForm {
    /// Blank form; new tasks start in `status`.
    pub fn new(projects: &[Project], status: Status) -> Self {
        let mut choices = vec![(None, "-".to_string())];
        choices.extend(projects.iter().map(|p| (Some(p.id), p.name.clone())));
        let priorities = [Priority::Low, Priority::Medium, Priority::High];
        let mut form = Self {
            editing: None,
            title: InputField::new(),
            description: InputField::new(),
            due: InputField::new(),
            status: status.column(),
            priority: 1,
            project_selector: 0,
            current_field: TITLE_GLOBAL_ORDER,
            projects: choices,
            priorities,
        };
        form.update_active_field();
        form
    }

    /// Form populated from an existing task.
    pub fn from_task(task: &Task, projects: &[Project]) -> Self {
        let mut form = Self::new(projects, task.status);
        form.editing = Some(task.id);
        form.title = InputField::with_value(&task.title);
        form.description = InputField::with_value(task.description.as_deref().unwrap_or(""));
        form.due = InputField::with_value(
            &task.due_date.map(|d| d.to_string()).unwrap_or_default(),
        );
        form.priority = form
            .priorities
            .iter()
            .position(|&p| p == task.priority)
            .unwrap_or(1);
        if let Some(project) = task.project {
            match form.projects.iter().position(|(id, _)| *id == Some(project)) {
                Some(index) => form.project_selector = index,
                None => {
                    // Dangling reference to a deleted project; keep it selectable.
                    form.projects.push((Some(project), project.to_string()));
                    form.project_selector = form.projects.len() - 1;
                }
            }
        }
        form.update_active_field();
        form
    }

    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % FIELD_COUNT;
        self.update_active_field();
    }

    pub fn prev_field(&mut self) {
        self.current_field = (self.current_field + FIELD_COUNT - 1) % FIELD_COUNT;
        self.update_active_field();
    }

    fn active_input(&mut self) -> Option<&mut InputField> {
        match self.current_field {
            TITLE_GLOBAL_ORDER => Some(&mut self.title),
            DESCRIPTION_GLOBAL_ORDER => Some(&mut self.description),
            DUE_GLOBAL_ORDER => Some(&mut self.due),
            _ => None,
        }
    }

    /// Update which field is currently active for editing.
    pub fn update_active_field(&mut self) {
        for field in [&mut self.title, &mut self.description, &mut self.due] {
            field.active = false;
        }
        if let Some(field) = self.active_input() {
            field.active = true;
        }
    }

    pub fn handle_char(&mut self, c: char) {
        if let Some(field) = self.active_input() {
            field.handle_char(c);
        }
    }

    pub fn handle_backspace(&mut self) {
        if let Some(field) = self.active_input() {
            field.handle_backspace();
        }
    }

    /// Left/right moves the cursor in text fields and cycles selectors.
    pub fn handle_left_right(&mut self, right: bool) {
        let cycle = |index: usize, len: usize| {
            if right {
                (index + 1) % len
            } else {
                (index + len - 1) % len
            }
        };
        match self.current_field {
            STATUS_GLOBAL_ORDER => self.status = cycle(self.status, Status::ALL.len()),
            PRIORITY_GLOBAL_ORDER => self.priority = cycle(self.priority, self.priorities.len()),
            PROJECT_SELECTOR_GLOBAL_ORDER => {
                self.project_selector = cycle(self.project_selector, self.projects.len())
            }
            _ => {
                if let Some(field) = self.active_input() {
                    if right {
                        field.move_cursor_right()
                    } else {
                        field.move_cursor_left()
                    }
                }
            }
        }
    }

    pub fn selected_status(&self) -> Status {
        Status::from_column(self.status).unwrap_or_default()
    }

    pub fn selected_priority(&self) -> Priority {
        self.priorities[self.priority]
    }

    pub fn selected_project(&self) -> Option<Uuid> {
        self.projects.get(self.project_selector).and_then(|(id, _)| *id)
    }

    pub fn selected_project_name(&self) -> &str {
        self.projects
            .get(self.project_selector)
            .map(|(_, name)| name.as_str())
            .unwrap_or("-")
    }

    /// Natural-language dates are resolved here; anything unparsable goes to the
    /// server verbatim so the validation message comes back to the user.
    fn due_value(&self) -> Option<String> {
        self.due.text().map(|raw| match parse_due_input(&raw) {
            Some(date) => date.to_string(),
            None => raw,
        })
    }

    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.text(),
            description: self.description.text(),
            status: Some(self.selected_status().to_string()),
            priority: Some(self.selected_priority().to_string()),
            due_date: self.due_value(),
            project: self.selected_project().map(|id| id.to_string()),
            subtasks: Vec::new(),
        }
    }

    /// Every field is sent; blank optional fields clear the stored value.
    pub fn to_patch(&self) -> TaskPatchDraft {
        TaskPatchDraft {
            title: Some(self.title.value.trim().to_string()),
            description: Some(self.description.text()),
            status: Some(self.selected_status().to_string()),
            priority: Some(self.selected_priority().to_string()),
            due_date: Some(self.due_value()),
            project: Some(self.selected_project().map(|id| id.to_string())),
            subtasks: None,
        }
    }

    /// Label/value pairs in navigation order, for rendering.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Title", self.title.value.clone()),
            ("Description", self.description.value.clone()),
            ("Due", self.due.value.clone()),
            ("Status", format!("< {} >", format_status(self.selected_status()))),
            ("Priority", format!("< {} >", format_priority(self.selected_priority()))),
            ("Project", format!("< {} >", self.selected_project_name())),
        ]
    }
}

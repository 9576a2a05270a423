//! Projects: optional, loosely coupled groupings for tasks.
//!
//! A task's `project` reference is never checked against this collection, and
//! deleting a project leaves referencing tasks untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::validate::{double_option, is_hex_color, Violations, DESCRIPTION_MAX, TITLE_MAX};

pub const DEFAULT_COLOR: &str = "#3498db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub owner: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn create(owner: Uuid, input: NewProject, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            name: input.name,
            description: input.description,
            color: input.color,
            created_at: now,
        }
    }

    pub fn apply(&mut self, patch: ProjectPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(color) = patch.color {
            self.color = color;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatchDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn check_color(v: &mut Violations, raw: String) -> Option<String> {
    let color = raw.trim().to_lowercase();
    if is_hex_color(&color) {
        Some(color)
    } else {
        v.push("color", "Color must be a hex value like #3498db");
        None
    }
}

impl ProjectDraft {
    pub fn validate(self) -> Result<NewProject, ServiceError> {
        let mut v = Violations::default();
        let name = v.required_text("name", self.name, Some(TITLE_MAX), "Project name is required");
        let description = self
            .description
            .and_then(|d| v.bounded("description", d, Some(DESCRIPTION_MAX)));
        let color = self.color.and_then(|c| check_color(&mut v, c));
        v.finish()?;
        Ok(NewProject {
            name: name.unwrap_or_default(),
            description,
            color: color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        })
    }
}

impl ProjectPatchDraft {
    pub fn validate(self) -> Result<ProjectPatch, ServiceError> {
        let mut v = Violations::default();
        let name = self
            .name
            .and_then(|n| v.required_text("name", Some(n), Some(TITLE_MAX), "Project name cannot be empty"));
        let description = self
            .description
            .map(|d| d.and_then(|d| v.bounded("description", d, Some(DESCRIPTION_MAX))));
        let color = self.color.and_then(|c| check_color(&mut v, c));
        v.finish()?;
        Ok(ProjectPatch {
            name,
            description,
            color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_color_applies() {
        let draft = ProjectDraft {
            name: Some(" Website ".into()),
            ..ProjectDraft::default()
        };
        let new = draft.validate().unwrap();
        assert_eq!(new.name, "Website");
        assert_eq!(new.color, DEFAULT_COLOR);
    }

    #[test]
    fn bad_color_and_blank_name_are_reported() {
        let draft = ProjectDraft {
            name: Some("  ".into()),
            description: None,
            color: Some("blue".into()),
        };
        match draft.validate() {
            Err(ServiceError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn patch_can_clear_description() {
        let mut project = Project::create(
            Uuid::new_v4(),
            NewProject {
                name: "P".into(),
                description: Some("old".into()),
                color: DEFAULT_COLOR.into(),
            },
            Utc::now(),
        );
        let patch: ProjectPatchDraft = serde_json::from_str(r#"{"description":null}"#).unwrap();
        project.apply(patch.validate().unwrap());
        assert_eq!(project.description, None);
        assert_eq!(project.name, "P");
    }
}

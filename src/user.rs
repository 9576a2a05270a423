//! User accounts and their productivity preferences.
//!
//! The stored `User` carries the password hash; everything that leaves the server
//! goes through `PublicUser`, which has no hash field at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::fields::Role;
use crate::validate::{is_valid_email, is_valid_hhmm, Violations, PASSWORD_MIN};

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub productivity_preferences: ProductivityPreferences,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityPreferences {
    pub work_hours_start: String,
    pub work_hours_end: String,
    /// Minutes.
    pub focus_session_duration: u32,
    /// Minutes.
    pub break_duration: u32,
    pub preferred_work_days: Vec<String>,
}

impl Default for ProductivityPreferences {
    fn default() -> Self {
        Self {
            work_hours_start: "09:00".into(),
            work_hours_end: "17:00".into(),
            focus_session_duration: 25,
            break_duration: 5,
            preferred_work_days: WEEKDAYS[..5].iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl ProductivityPreferences {
    /// Merge the supplied sub-fields, leaving the rest untouched.
    pub fn merge(&mut self, patch: PreferencesPatch) {
        if let Some(v) = patch.work_hours_start {
            self.work_hours_start = v;
        }
        if let Some(v) = patch.work_hours_end {
            self.work_hours_end = v;
        }
        if let Some(v) = patch.focus_session_duration {
            self.focus_session_duration = v;
        }
        if let Some(v) = patch.break_duration {
            self.break_duration = v;
        }
        if let Some(v) = patch.preferred_work_days {
            self.preferred_work_days = v;
        }
    }
}

/// The user as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub productivity_preferences: ProductivityPreferences,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            productivity_preferences: u.productivity_preferences.clone(),
            created_at: u.created_at,
            last_login: u.last_login,
        }
    }
}

pub fn normalise_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn check_email(v: &mut Violations, raw: Option<String>) -> Option<String> {
    let email = v.required_text("email", raw, None, "Email is required")?;
    let email = normalise_email(&email);
    if is_valid_email(&email) {
        Some(email)
    } else {
        v.push("email", "Please provide a valid email");
        None
    }
}

fn check_new_password(v: &mut Violations, field: &str, raw: Option<String>) -> Option<String> {
    match raw {
        Some(p) if p.chars().count() >= PASSWORD_MIN => Some(p),
        Some(_) => {
            v.push(field, format!("Password must be at least {PASSWORD_MIN} characters"));
            None
        }
        None => {
            v.push(field, "Password is required");
            None
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl RegisterDraft {
    pub fn validate(self) -> Result<Registration, ServiceError> {
        let mut v = Violations::default();
        let name = v.required_text("name", self.name, None, "Name is required");
        let email = check_email(&mut v, self.email);
        let password = check_new_password(&mut v, "password", self.password);
        let role = match self.role {
            Some(raw) => v.parse_enum("role", &raw, "Role must be one of user, admin"),
            None => Some(Role::default()),
        };
        v.finish()?;
        Ok(Registration {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default(),
            role: role.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl LoginDraft {
    /// Presence checks only; a malformed email simply fails to match a user.
    pub fn validate(self) -> Result<(String, String), ServiceError> {
        let mut v = Violations::default();
        let email = v.required_text("email", self.email, None, "Email is required");
        let password = self.password.filter(|p| !p.is_empty());
        v.check(password.is_some(), "password", "Password is required");
        v.finish()?;
        Ok((
            normalise_email(&email.unwrap_or_default()),
            password.unwrap_or_default(),
        ))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

impl PasswordChangeDraft {
    pub fn validate(self) -> Result<(String, String), ServiceError> {
        let mut v = Violations::default();
        let current = self.current_password.filter(|p| !p.is_empty());
        v.check(current.is_some(), "currentPassword", "Current password is required");
        let new = check_new_password(&mut v, "newPassword", self.new_password);
        v.finish()?;
        Ok((current.unwrap_or_default(), new.unwrap_or_default()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountDeletionDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AccountDeletionDraft {
    pub fn validate(self) -> Result<String, ServiceError> {
        match self.password.filter(|p| !p.is_empty()) {
            Some(p) => Ok(p),
            None => Err(ServiceError::validation(
                "password",
                "Password is required to delete account",
            )),
        }
    }
}

/// Partial preference update; each sub-field is merged on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_hours_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_hours_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_session_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_work_days: Option<Vec<String>>,
}

impl PreferencesPatch {
    fn check(&self, v: &mut Violations, prefix: &str) {
        let field = |name: &str| format!("{prefix}{name}");
        if let Some(t) = &self.work_hours_start {
            v.check(is_valid_hhmm(t), &field("workHoursStart"), "Work hours start must be in HH:MM format");
        }
        if let Some(t) = &self.work_hours_end {
            v.check(is_valid_hhmm(t), &field("workHoursEnd"), "Work hours end must be in HH:MM format");
        }
        if let Some(m) = self.focus_session_duration {
            v.check(m > 0, &field("focusSessionDuration"), "Focus session duration must be positive");
        }
        if let Some(m) = self.break_duration {
            v.check(m > 0, &field("breakDuration"), "Break duration must be positive");
        }
        if let Some(days) = &self.preferred_work_days {
            let known = days.iter().all(|d| WEEKDAYS.contains(&d.as_str()));
            v.check(known, &field("preferredWorkDays"), "Preferred work days must be weekday names");
        }
    }

    pub fn validate(self) -> Result<PreferencesPatch, ServiceError> {
        let mut v = Violations::default();
        self.check(&mut v, "");
        v.finish()?;
        Ok(self)
    }
}

/// Profile update. Anything other than these two fields is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub productivity_preferences: Option<PreferencesPatch>,
}

impl ProfilePatch {
    pub fn validate(self) -> Result<ProfilePatch, ServiceError> {
        let mut v = Violations::default();
        let name = self
            .name
            .and_then(|n| v.required_text("name", Some(n), None, "Name cannot be empty"));
        if let Some(prefs) = &self.productivity_preferences {
            prefs.check(&mut v, "productivityPreferences.");
        }
        v.finish()?;
        Ok(ProfilePatch {
            name,
            productivity_preferences: self.productivity_preferences,
        })
    }
}

/// Task counts for `GET /api/users/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    pub overdue: usize,
    /// Whole percent of tasks that are done; 0 when there are none.
    pub completion_rate: u8,
}

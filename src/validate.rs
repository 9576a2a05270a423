//! Field-level validation helpers for incoming payloads.
//!
//! Request bodies are deserialised into loosely typed drafts (plain strings,
//! optional everything) and then checked field by field here, so that a bad enum
//! value or an over-long title surfaces as a `ValidationError` naming the field
//! instead of an opaque deserialisation failure.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use crate::error::{FieldError, ServiceError};

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 1000;
pub const PASSWORD_MIN: usize = 6;

/// Accumulates field errors so a single response can report all of them.
#[derive(Debug, Default)]
pub struct Violations {
    errors: Vec<FieldError>,
}

impl Violations {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.push(field, message);
        }
    }

    /// Trimmed, non-empty text no longer than `max` characters.
    pub fn required_text(
        &mut self,
        field: &str,
        raw: Option<String>,
        max: Option<usize>,
        missing: &str,
    ) -> Option<String> {
        match raw.map(|s| s.trim().to_string()) {
            Some(s) if !s.is_empty() => self.bounded(field, s, max),
            _ => {
                self.push(field, missing);
                None
            }
        }
    }

    /// Text that may be empty but must fit in `max` characters.
    pub fn bounded(&mut self, field: &str, value: String, max: Option<usize>) -> Option<String> {
        match max {
            Some(max) if value.chars().count() > max => {
                self.push(field, format!("{} cannot exceed {max} characters", capitalise(field)));
                None
            }
            _ => Some(value),
        }
    }

    /// Parse an enumerated wire value, recording `message` when it is not recognised.
    pub fn parse_enum<T: std::str::FromStr>(
        &mut self,
        field: &str,
        raw: &str,
        message: &str,
    ) -> Option<T> {
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.push(field, message);
                None
            }
        }
    }

    pub fn due_date(&mut self, field: &str, raw: &str) -> Option<NaiveDate> {
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.push(field, "Due date must be a valid date");
        }
        parsed
    }

    pub fn reference(&mut self, field: &str, raw: &str) -> Option<Uuid> {
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.push(field, format!("{} must be a valid identifier", capitalise(field)));
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert the collected errors into a `ServiceError::Validation`, if any.
    pub fn finish(self) -> Result<(), ServiceError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self.errors))
        }
    }
}

fn capitalise(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (its UTC date is kept).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

#[allow(clippy::expect_used)] // literal pattern
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("static email regex"));
#[allow(clippy::expect_used)] // literal pattern
static HHMM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$").expect("static time regex"));
#[allow(clippy::expect_used)] // literal pattern
static HEX_COLOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("static colour regex"));

/// Loose email shape: non-space text, `@`, non-space text, `.`, non-space text.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// `HH:MM` on a 24 hour clock; a single-digit hour is accepted.
pub fn is_valid_hhmm(value: &str) -> bool {
    HHMM_REGEX.is_match(value)
}

/// `#RRGGBB`.
pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR_REGEX.is_match(value)
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use together with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

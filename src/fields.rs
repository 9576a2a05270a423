//! Enumerations and field types for task management.
//!
//! This module defines the structured values used to categorise tasks and users:
//! task status, priority, user role, plus the client-side sorting and due-date
//! filters used by the command line.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task completion status. Board columns follow this order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Todo, Status::InProgress, Status::Done];

    /// Wire name, as used in JSON bodies and query strings.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in-progress",
            Status::Done => "done",
        }
    }

    /// Two-state completion flip: `done` goes back to `todo`, everything else to `done`.
    pub fn toggled(self) -> Status {
        match self {
            Status::Done => Status::Todo,
            Status::Todo | Status::InProgress => Status::Done,
        }
    }

    /// Column index on the board.
    pub fn column(self) -> usize {
        match self {
            Status::Todo => 0,
            Status::InProgress => 1,
            Status::Done => 2,
        }
    }

    pub fn from_column(index: usize) -> Option<Status> {
        Status::ALL.get(index).copied()
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Status::Todo),
            "in-progress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority classification for task importance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account role carried in tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    /// Server order: due date ascending, undated last, newest first.
    Due,
    Priority,
    Created,
}

/// Filtering options for tasks based on due dates.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DueFilter {
    Today,
    ThisWeek,
    Overdue,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_is_two_state() {
        assert_eq!(Status::InProgress.toggled(), Status::Done);
        assert_eq!(Status::Done.toggled(), Status::Todo);
        assert_eq!(Status::Todo.toggled(), Status::Done);
    }

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for s in Status::ALL {
            assert_eq!(s.as_str().parse::<Status>(), Ok(s));
        }
        assert!("backlog".parse::<Status>().is_err());
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"in-progress\"");
    }

    #[test]
    fn columns_match_status_order() {
        for s in Status::ALL {
            assert_eq!(Status::from_column(s.column()), Some(s));
        }
        assert_eq!(Status::from_column(3), None);
    }
}

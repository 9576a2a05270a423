//! Formatting, date input parsing and identifier resolution for the command line.
//!
//! Tasks are addressed on the command line by full id, unique id prefix, or exact
//! (case-insensitive) title, so none of the commands need a UUID pasted in.

use chrono::{Datelike, Duration, Local, NaiveDate};
use uuid::Uuid;

use crate::fields::*;
use crate::project::Project;
use crate::task::Task;

/// Parse human-readable due date input with smart natural language support.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "next monday", "this friday", bare weekday names
/// - "end of week", "end of month", "weekend"
/// - "in 3d", "in 2w", "in 1m"
/// - "YYYY-MM-DD" format
pub fn parse_due_input(s: &str) -> Option<NaiveDate> {
    parse_due_relative_to(s, Local::now().date_naive())
}

pub fn parse_due_relative_to(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        "end of week" | "eow" => return Some(start_end_of_this_week(today).1),
        "end of month" | "eom" => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            return Some(NaiveDate::from_ymd_opt(year, month, 1)? - Duration::days(1));
        }
        "this weekend" | "weekend" => {
            let days_until_saturday = (5 + 7 - today.weekday().num_days_from_monday()) % 7;
            return Some(today + Duration::days(days_until_saturday as i64));
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        if let Some(unit) = rest.chars().last() {
            let num = &rest[..rest.len() - unit.len_utf8()];
            if let Ok(n) = num.trim().parse::<i64>() {
                match unit {
                    'd' => return Some(today + Duration::days(n)),
                    'w' => return Some(today + Duration::weeks(n)),
                    // Approximate: 30 days per month
                    'm' => return Some(today + Duration::days(n * 30)),
                    _ => {}
                }
            }
        }
    }

    let weekdays = [
        ("monday", 0), ("tuesday", 1), ("wednesday", 2), ("thursday", 3),
        ("friday", 4), ("saturday", 5), ("sunday", 6),
        ("mon", 0), ("tue", 1), ("wed", 2), ("thu", 3),
        ("fri", 4), ("sat", 5), ("sun", 6),
    ];
    let current = today.weekday().num_days_from_monday() as i64;
    for (name, target) in weekdays {
        let ahead = (target + 7 - current) % 7;
        if s == name || s == format!("this {name}") {
            return Some(today + Duration::days(ahead));
        }
        if s == format!("next {name}") {
            let ahead = if ahead == 0 { 7 } else { ahead + 7 };
            return Some(today + Duration::days(ahead));
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Calculate the start and end dates of the current ISO week (Monday to Sunday).
pub fn start_end_of_this_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let weekday = today.weekday().num_days_from_monday() as i64;
    let start = today - Duration::days(weekday);
    (start, start + Duration::days(6))
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => match (d - today).num_days() {
            0 => "today".into(),
            1 => "tomorrow".into(),
            n if n > 1 => format!("in {n}d"),
            n => format!("{}d late", -n),
        },
    }
}

/// Format a task status for display.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Todo => "To Do",
        Status::InProgress => "In Progress",
        Status::Done => "Done",
    }
}

/// Format a priority level for display.
pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// First eight characters of an id; enough to address a task on the command line.
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Print tasks in a formatted table.
pub fn print_table(tasks: &[&Task], projects: &[Project]) {
    println!(
        "{:<9} {:<12} {:<7} {:<10} {:<14} {:<6} Title",
        "ID", "Status", "Pri", "Due", "Project", "Subs"
    );
    let today = Local::now().date_naive();
    for t in tasks {
        let project = t
            .project
            .map(|id| {
                projects
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| short_id(id))
            })
            .unwrap_or_else(|| "-".into());
        let subs = if t.subtasks.is_empty() {
            "-".to_string()
        } else {
            format!("{}/{}", t.completed_subtasks(), t.subtasks.len())
        };
        println!(
            "{:<9} {:<12} {:<7} {:<10} {:<14} {:<6} {}",
            short_id(t.id),
            format_status(t.status),
            format_priority(t.priority),
            format_due_relative(t.due_date, today),
            truncate(&project, 14),
            subs,
            t.title
        );
    }
}

fn id_matches(id: Uuid, needle: &str) -> bool {
    let needle = needle.to_lowercase().replace('-', "");
    !needle.is_empty() && id.simple().to_string().starts_with(&needle)
}

/// Resolve a task identifier (full id, unique id prefix, or title) to a task ID.
/// Returns an error if the identifier is ambiguous and suggests using the ID instead.
pub fn resolve_task_identifier(identifier: &str, tasks: &[Task]) -> Result<Uuid, String> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return Ok(id);
    }

    let by_prefix: Vec<&Task> = tasks.iter().filter(|t| id_matches(t.id, identifier)).collect();
    if by_prefix.len() == 1 {
        return Ok(by_prefix[0].id);
    }

    let wanted = identifier.to_lowercase();
    let by_title: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.title.to_lowercase() == wanted)
        .collect();

    let matches = if by_title.is_empty() { by_prefix } else { by_title };
    match matches.len() {
        0 => Err(format!("No task found matching '{identifier}'")),
        1 => Ok(matches[0].id),
        _ => {
            let mut msg = format!("Multiple tasks match '{identifier}':\n");
            for task in matches {
                msg.push_str(&format!(
                    "  {}: {} ({})\n",
                    short_id(task.id),
                    task.title,
                    format_status(task.status)
                ));
            }
            msg.push_str("Please use the specific ID instead.");
            Err(msg)
        }
    }
}

/// Same rules as tasks, matching on project name.
pub fn resolve_project_identifier(identifier: &str, projects: &[Project]) -> Result<Uuid, String> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return Ok(id);
    }
    let wanted = identifier.to_lowercase();
    let matches: Vec<&Project> = projects
        .iter()
        .filter(|p| p.name.to_lowercase() == wanted || id_matches(p.id, identifier))
        .collect();
    match matches.as_slice() {
        [] => Err(format!("No project found matching '{identifier}'")),
        [one] => Ok(one.id),
        _ => Err(format!(
            "Multiple projects match '{identifier}'. Please use the specific ID instead."
        )),
    }
}

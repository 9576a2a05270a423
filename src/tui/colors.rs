//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::{Priority, Status};

pub const SLATE: Color = Color::Rgb(52, 73, 94);
pub const AMBER: Color = Color::Rgb(243, 156, 18);
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);

/// Column accent for each status.
pub fn status_color(status: Status) -> Color {
    match status {
        Status::Todo => Color::Blue,
        Status::InProgress => AMBER,
        Status::Done => DARK_GREEN,
    }
}

pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Low => Color::Gray,
        Priority::Medium => Color::Cyan,
        Priority::High => Color::LightRed,
    }
}

/// Readable foreground on top of a status accent.
pub fn text_on(status: Status) -> Color {
    match status {
        Status::InProgress => Color::Rgb(20, 20, 20),
        _ => Color::White,
    }
}

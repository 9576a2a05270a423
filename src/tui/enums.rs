//! Enumerations for TUI state management.

/// What the board is currently showing on top of the columns.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppState {
    Board,
    TaskDetail,
    Filter,
    AddTask,
    EditTask,
    AddSubtask,
    ConfirmDelete,
    Help,
}

/// Why the board closed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BoardExit {
    Quit,
    /// The server rejected our token; the caller must clear the session.
    SessionExpired,
}

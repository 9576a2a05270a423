//! Kanban board interface.
//!
//! Tasks are organised into one column per status. Moving a card (Ctrl/Shift +
//! Left/Right) or toggling completion is applied to the local [`Board`] at once
//! and sent to the server from a worker thread; the answer arrives over a
//! channel and either confirms the card or puts it back. A second thread follows
//! the server's event stream so changes made elsewhere show up live.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use uuid::Uuid;

use crate::board::Board;
use crate::client::{ApiClient, ClientError};
use crate::display::{format_due_relative, format_priority, format_status, short_id, truncate};
use crate::events::TaskEvent;
use crate::fields::Status;
use crate::project::Project;
use crate::session::Session;
use crate::task::{SubtaskPatch, Task, TaskPatchDraft, TaskQuery};
use crate::tui::colors::{priority_color, status_color, text_on, DARK_RED, SLATE};
use crate::tui::enums::{AppState, BoardExit};
use crate::tui::input::InputField;
use crate::tui::task_form::TaskForm;
use crate::tui::utils::centered_rect;
use crate::user::PublicUser;

const CARD_HEIGHT: usize = 5;
const HELP: &str = "Enter: Details | a: Add | e: Edit | s: Subtask | Space: Complete | \
Ctrl+←/→: Move | d: Delete | r: Reload | /: Filter | Esc: Exit";

/// Result of background work, delivered to the UI loop.
#[derive(Debug)]
pub enum Outcome {
    Moved {
        id: Uuid,
        result: Result<Task, ClientError>,
    },
    Saved(Result<Task, ClientError>),
    Deleted {
        id: Uuid,
        result: Result<(), ClientError>,
    },
    Reloaded {
        since: u64,
        result: Result<(Vec<Task>, Vec<Project>), ClientError>,
    },
    Event(TaskEvent),
    StreamClosed(Option<ClientError>),
}

/// Main board application state
pub struct KanbanApp {
    client: ApiClient,
    server: String,
    user: Option<PublicUser>,
    board: Board,
    projects: Vec<Project>,
    state: AppState,
    selected_column: usize,
    selected_card: usize,
    column_scroll_offsets: [usize; 3],
    status_message: String,
    status_is_error: bool,
    filter_text: String,
    form: Option<TaskForm>,
    subtask_input: InputField,
    live: bool,
    exit: Option<BoardExit>,
    tx: Sender<Outcome>,
    rx: Receiver<Outcome>,
}

impl KanbanApp {
    /// Fetch the caller's tasks and projects and build the board.
    pub fn connect(session: &Session) -> Result<Self, ClientError> {
        let client = ApiClient::from_session(session);
        let tasks = client.list_tasks(&TaskQuery::default())?;
        let projects = client.list_projects()?;
        Ok(Self::new(client, session, tasks, projects))
    }

    pub fn new(client: ApiClient, session: &Session, tasks: Vec<Task>, projects: Vec<Project>) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut app = Self {
            client,
            server: session.server.clone(),
            user: session.user.clone(),
            board: Board::new(tasks),
            projects,
            state: AppState::Board,
            selected_column: 0,
            selected_card: 0,
            column_scroll_offsets: [0; 3],
            status_message: String::new(),
            status_is_error: false,
            filter_text: String::new(),
            form: None,
            subtask_input: InputField::new(),
            live: false,
            exit: None,
            tx,
            rx,
        };
        app.clamp_selection();
        app
    }

    /// Follow the server's event stream on a dedicated thread.
    pub fn start_event_stream(&mut self) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let failure = match client.events() {
                Ok(events) => {
                    for event in events {
                        if tx.send(Outcome::Event(event)).is_err() {
                            return;
                        }
                    }
                    None
                }
                Err(err) => Some(err),
            };
            let _ = tx.send(Outcome::StreamClosed(failure));
        });
        self.live = true;
    }

    /// Run `job` against the API off the UI thread.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce(&ApiClient) -> Outcome + Send + 'static,
    {
        let client = self.client.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job(&client));
        });
    }

    fn matches_filter(&self, task: &Task) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        let needle = self.filter_text.to_lowercase();
        let project_matches = task
            .project
            .and_then(|id| self.projects.iter().find(|p| p.id == id))
            .is_some_and(|p| p.name.to_lowercase().contains(&needle));
        task.title.to_lowercase().contains(&needle)
            || task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
            || project_matches
    }

    fn column_tasks(&self, column: usize) -> Vec<&Task> {
        let Some(status) = Status::from_column(column) else {
            return Vec::new();
        };
        self.board
            .column(status)
            .into_iter()
            .filter(|t| self.matches_filter(t))
            .collect()
    }

    fn selected_task(&self) -> Option<&Task> {
        self.column_tasks(self.selected_column)
            .get(self.selected_card)
            .copied()
    }

    fn selected_task_id(&self) -> Option<Uuid> {
        self.selected_task().map(|t| t.id)
    }

    /// Ensure selected column and card indices are valid
    fn clamp_selection(&mut self) {
        if self.selected_column >= Status::ALL.len() {
            self.selected_column = 0;
        }
        let len = self.column_tasks(self.selected_column).len();
        if len == 0 {
            self.selected_card = 0;
            self.column_scroll_offsets[self.selected_column] = 0;
        } else if self.selected_card >= len {
            self.selected_card = len - 1;
        }
    }

    /// Keep the selection on `id` wherever it now lives.
    fn follow(&mut self, id: Uuid) {
        let Some(status) = self.board.task(id).map(|t| t.status) else {
            self.clamp_selection();
            return;
        };
        self.selected_column = status.column();
        self.selected_card = self
            .column_tasks(self.selected_column)
            .iter()
            .position(|t| t.id == id)
            .unwrap_or(0);
        self.clamp_selection();
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = false;
    }

    fn set_error_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = true;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
        self.status_is_error = false;
    }

    /// Surface a failed call. A rejected token ends the board.
    fn report(&mut self, context: &str, err: &ClientError) {
        if err.is_unauthenticated() {
            self.exit = Some(BoardExit::SessionExpired);
        } else {
            self.set_error_message(format!("{context}: {err}"));
        }
    }

    /// Show the change locally and ask the server to make it.
    fn begin_move(&mut self, id: Uuid, to: Status, toggle: bool) {
        if self.board.is_pending(id) {
            self.set_error_message("Still waiting for the server to confirm the previous change");
            return;
        }
        let Some(mv) = self.board.begin_move(id, to) else {
            return;
        };
        self.set_status_message(format!("Moving to {}...", format_status(mv.to)));
        self.follow(id);
        if toggle {
            self.spawn(move |client| Outcome::Moved {
                id,
                result: client.toggle_complete(id),
            });
        } else {
            let patch = TaskPatchDraft {
                status: Some(to.to_string()),
                ..TaskPatchDraft::default()
            };
            self.spawn(move |client| Outcome::Moved {
                id,
                result: client.update_task(id, &patch),
            });
        }
    }

    fn move_card(&mut self, right: bool) {
        let Some(id) = self.selected_task_id() else {
            return;
        };
        let target = if right {
            self.selected_column + 1
        } else {
            match self.selected_column.checked_sub(1) {
                Some(column) => column,
                None => return,
            }
        };
        if let Some(to) = Status::from_column(target) {
            self.begin_move(id, to, false);
        }
    }

    fn toggle_completion(&mut self) {
        if let Some(task) = self.selected_task() {
            let (id, to) = (task.id, task.status.toggled());
            self.begin_move(id, to, true);
        }
    }

    fn toggle_subtask(&mut self, index: usize) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let Some(subtask) = task.subtasks.get(index) else {
            return;
        };
        let (id, subtask_id) = (task.id, subtask.id);
        let patch = SubtaskPatch {
            completed: Some(!subtask.completed),
            title: None,
        };
        self.spawn(move |client| Outcome::Saved(client.set_subtask(id, subtask_id, &patch)));
    }

    fn reload(&mut self) {
        self.set_status_message("Reloading...");
        let since = self.board.revision();
        self.spawn(move |client| Outcome::Reloaded {
            since,
            result: client
                .list_tasks(&TaskQuery::default())
                .and_then(|tasks| Ok((tasks, client.list_projects()?))),
        });
    }

    fn open_form(&mut self, edit: bool) {
        let form = if edit {
            let Some(task) = self.selected_task() else {
                return;
            };
            if self.board.is_pending(task.id) {
                self.set_error_message("Card is still saving");
                return;
            }
            TaskForm::from_task(task, &self.projects)
        } else {
            let status = Status::from_column(self.selected_column).unwrap_or_default();
            TaskForm::new(&self.projects, status)
        };
        self.form = Some(form);
        self.state = if edit { AppState::EditTask } else { AppState::AddTask };
    }

    /// Validate locally so a typo keeps the form open, then send it.
    fn submit_form(&mut self) {
        let Some(form) = self.form.as_ref() else {
            return;
        };
        match form.editing {
            None => {
                let draft = form.to_draft();
                if let Err(err) = draft.clone().validate() {
                    self.set_error_message(err.to_string());
                    return;
                }
                self.spawn(move |client| Outcome::Saved(client.create_task(&draft)));
            }
            Some(id) => {
                let patch = form.to_patch();
                if let Err(err) = patch.clone().validate() {
                    self.set_error_message(err.to_string());
                    return;
                }
                self.spawn(move |client| Outcome::Saved(client.update_task(id, &patch)));
            }
        }
        self.form = None;
        self.state = AppState::Board;
        self.set_status_message("Saving...");
    }

    fn submit_subtask(&mut self) {
        self.state = AppState::Board;
        let Some(title) = self.subtask_input.text() else {
            return;
        };
        self.subtask_input.clear();
        let Some(id) = self.selected_task_id() else {
            return;
        };
        self.spawn(move |client| Outcome::Saved(client.add_subtask(id, &title)));
    }

    fn delete_selected(&mut self) {
        self.state = AppState::Board;
        if let Some(id) = self.selected_task_id() {
            if self.board.is_pending(id) {
                self.set_error_message("Card is still saving");
                return;
            }
            self.set_status_message("Deleting...");
            self.spawn(move |client| Outcome::Deleted {
                id,
                result: client.delete_task(id),
            });
        }
    }

    /// Apply everything the workers have delivered so far.
    pub fn drain(&mut self) {
        while let Ok(outcome) = self.rx.try_recv() {
            self.handle_outcome(outcome);
        }
    }

    pub fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Moved { id, result } => match result {
                Ok(task) => {
                    let status = task.status;
                    if self.board.confirm(task) {
                        self.set_status_message(format!("Saved: {}", format_status(status)));
                    }
                }
                Err(err) => {
                    let restored = self.board.revert(id);
                    let context = match restored {
                        Some(status) => format!("Move failed, card restored to {}", format_status(status)),
                        None => "Move failed".to_string(),
                    };
                    self.report(&context, &err);
                }
            },
            Outcome::Saved(Ok(task)) => {
                let (id, title) = (task.id, task.title.clone());
                // A move in flight will bring the server copy with it.
                if !self.board.is_pending(id) {
                    self.board.settle(task);
                }
                self.follow(id);
                self.set_status_message(format!("Saved '{}'", truncate(&title, 40)));
            }
            Outcome::Saved(Err(err)) => self.report("Save failed", &err),
            Outcome::Deleted { id, result } => match result {
                Ok(()) => {
                    self.board.remove(id);
                    self.set_status_message("Task removed");
                }
                Err(err) => self.report("Delete failed", &err),
            },
            Outcome::Reloaded {
                since,
                result: Ok((tasks, projects)),
            } => {
                let count = tasks.len();
                if self.board.replace_all(tasks, since) {
                    self.projects = projects;
                    self.clamp_selection();
                    self.set_status_message(format!("Reloaded {count} tasks"));
                }
            }
            Outcome::Reloaded { result: Err(err), .. } => self.report("Reload failed", &err),
            Outcome::Event(event) => {
                self.board.apply_event(&event);
            }
            Outcome::StreamClosed(err) => {
                self.live = false;
                match err {
                    Some(err) => self.report("Live updates unavailable", &err),
                    None => self.set_error_message("Live updates disconnected; press r to reload"),
                }
            }
        }
        self.clamp_selection();
    }

    /// Handle one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.state {
            AppState::Filter => self.handle_filter_key(key),
            AppState::AddTask | AppState::EditTask => self.handle_form_key(key),
            AppState::AddSubtask => match key.code {
                KeyCode::Esc => {
                    self.subtask_input.clear();
                    self.state = AppState::Board;
                }
                KeyCode::Enter => self.submit_subtask(),
                KeyCode::Backspace => self.subtask_input.handle_backspace(),
                KeyCode::Left => self.subtask_input.move_cursor_left(),
                KeyCode::Right => self.subtask_input.move_cursor_right(),
                KeyCode::Char(c) => self.subtask_input.handle_char(c),
                _ => {}
            },
            AppState::ConfirmDelete => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.delete_selected(),
                _ => {
                    self.state = AppState::Board;
                    self.set_status_message("Delete cancelled");
                }
            },
            AppState::TaskDetail => match key.code {
                KeyCode::Enter | KeyCode::Esc => self.state = AppState::Board,
                KeyCode::Char(' ') => self.toggle_completion(),
                KeyCode::Char(c @ '1'..='9') => {
                    self.toggle_subtask(c as usize - '1' as usize);
                }
                _ => {}
            },
            AppState::Help => self.state = AppState::Board,
            AppState::Board => self.handle_board_key(key),
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.filter_text.clear();
                self.state = AppState::Board;
                self.clear_status_message();
            }
            KeyCode::Enter => {
                self.state = AppState::Board;
                if self.filter_text.is_empty() {
                    self.set_status_message("Filter cleared");
                } else {
                    let shown: usize = (0..Status::ALL.len()).map(|c| self.column_tasks(c).len()).sum();
                    self.set_status_message(format!("Filter: '{}' ({shown} tasks shown)", self.filter_text));
                }
            }
            KeyCode::Backspace => {
                self.filter_text.pop();
            }
            KeyCode::Char(c) => self.filter_text.push(c),
            _ => {}
        }
        self.clamp_selection();
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let Some(form) = self.form.as_mut() else {
            self.state = AppState::Board;
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.form = None;
                self.state = AppState::Board;
                self.clear_status_message();
            }
            KeyCode::Enter => self.submit_form(),
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.handle_left_right(false),
            KeyCode::Right => form.handle_left_right(true),
            KeyCode::Backspace => form.handle_backspace(),
            KeyCode::Char(c) => form.handle_char(c),
            _ => {}
        }
    }

    fn handle_board_key(&mut self, key: KeyEvent) {
        let shifted = key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        self.clear_status_message();
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.exit = Some(BoardExit::Quit)
            }
            KeyCode::Esc | KeyCode::Char('q') => self.exit = Some(BoardExit::Quit),

            // Card movement between columns (check first, before regular navigation)
            KeyCode::Left if shifted => self.move_card(false),
            KeyCode::Right if shifted => self.move_card(true),

            KeyCode::Left => {
                if self.selected_column > 0 {
                    self.selected_column -= 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Right => {
                if self.selected_column + 1 < Status::ALL.len() {
                    self.selected_column += 1;
                    self.clamp_selection();
                }
            }
            KeyCode::Up => self.selected_card = self.selected_card.saturating_sub(1),
            KeyCode::Down => {
                let len = self.column_tasks(self.selected_column).len();
                if self.selected_card + 1 < len {
                    self.selected_card += 1;
                }
            }

            KeyCode::Enter => {
                if self.selected_task().is_some() {
                    self.state = AppState::TaskDetail;
                }
            }
            KeyCode::Char(' ') | KeyCode::Char('c') => self.toggle_completion(),
            KeyCode::Char('a') => self.open_form(false),
            KeyCode::Char('e') => self.open_form(true),
            KeyCode::Char('s') => {
                if self.selected_task().is_some() {
                    self.state = AppState::AddSubtask;
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => match self.selected_task_id() {
                Some(id) if self.board.is_pending(id) => self.set_error_message("Card is still saving"),
                Some(_) => self.state = AppState::ConfirmDelete,
                None => {}
            },
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('/') => {
                self.state = AppState::Filter;
            }
            KeyCode::Char('h') | KeyCode::Char('?') => self.state = AppState::Help,
            _ => {}
        }
    }

    fn handle_input(&mut self) -> io::Result<()> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    /// Main event loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<BoardExit> {
        loop {
            self.drain();
            if let Some(exit) = self.exit {
                return Ok(exit);
            }
            terminal.draw(|f| self.render(f))?;
            self.handle_input()?;
        }
    }

    /// Render the board and whatever overlay is open
    pub fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_board(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);

        match self.state {
            AppState::TaskDetail => self.render_task_detail_popup(f),
            AppState::AddTask | AppState::EditTask => self.render_form(f),
            AppState::AddSubtask => self.render_prompt(f, "New subtask (Enter to add, Esc to cancel)"),
            AppState::ConfirmDelete => self.render_confirm(f),
            AppState::Help => self.render_help(f),
            AppState::Board | AppState::Filter => {}
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let who = match &self.user {
            Some(user) => format!("{} <{}>", user.name, user.email),
            None => "unknown user".to_string(),
        };
        let (live, live_color) = if self.live {
            ("live", Color::Green)
        } else {
            ("offline", Color::DarkGray)
        };
        let mut spans = vec![
            Span::styled("TASK BOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("{who} @ {}", self.server),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
            Span::raw("  "),
            Span::styled(live, Style::default().fg(live_color)),
        ];
        let pending = self.board.pending_count();
        if pending > 0 {
            spans.push(Span::styled(
                format!("  {pending} saving"),
                Style::default().fg(Color::Yellow),
            ));
        }
        let header = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_board(&mut self, f: &mut Frame, area: Rect) {
        let columns_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(area);
        for (i, status) in Status::ALL.into_iter().enumerate() {
            self.render_column(f, columns_layout[i], i, status);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, column: usize, status: Status) {
        let is_selected = column == self.selected_column;
        let cards: Vec<Uuid> = self.column_tasks(column).iter().map(|t| t.id).collect();
        let accent = status_color(status);
        let border_style = if is_selected {
            Style::default().fg(accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({})", format_status(status), cards.len()))
            .border_style(border_style);
        let inner = block.inner(area);
        f.render_widget(block, area);

        if cards.is_empty() {
            return;
        }

        let available_height = inner.height as usize;
        let visible_cards = available_height / CARD_HEIGHT;

        // Keep the selected card in view.
        let scroll_offset = if is_selected {
            let start = self.column_scroll_offsets[column];
            let end = start + visible_cards;
            let offset = if self.selected_card < start {
                self.selected_card
            } else if self.selected_card >= end && visible_cards > 0 {
                self.selected_card + 1 - visible_cards
            } else {
                start
            };
            self.column_scroll_offsets[column] = offset;
            offset
        } else {
            self.column_scroll_offsets[column].min(cards.len().saturating_sub(1))
        };

        let mut current_y = 0;
        let mut rendered = 0;
        for (index, id) in cards.iter().enumerate().skip(scroll_offset) {
            if current_y + CARD_HEIGHT > available_height {
                break;
            }
            if let Some(task) = self.board.task(*id) {
                let card_area = Rect {
                    x: inner.x,
                    y: inner.y + current_y as u16,
                    width: inner.width,
                    height: CARD_HEIGHT as u16,
                };
                self.render_card(f, card_area, task, is_selected && index == self.selected_card);
                current_y += CARD_HEIGHT;
                rendered += 1;
            }
        }

        let indicator = Style::default().fg(Color::Cyan);
        if scroll_offset > 0 {
            f.render_widget(
                Paragraph::new(format!("▲ +{scroll_offset} above")).style(indicator),
                Rect { height: 1, ..inner },
            );
        }
        let remaining = cards.len().saturating_sub(scroll_offset + rendered);
        if remaining > 0 && inner.height > 0 {
            f.render_widget(
                Paragraph::new(format!("▼ +{remaining} below")).style(indicator),
                Rect {
                    y: inner.y + inner.height - 1,
                    height: 1,
                    ..inner
                },
            );
        }
    }

    fn render_card(&self, f: &mut Frame, area: Rect, task: &Task, is_selected: bool) {
        let accent = status_color(task.status);
        let style = if is_selected {
            Style::default().bg(accent).fg(text_on(task.status)).add_modifier(Modifier::BOLD)
        } else {
            Style::default().bg(SLATE)
        };
        let width = area.width.saturating_sub(2) as usize;
        let today = Local::now().date_naive();

        let mut meta = vec![
            Span::styled(
                format_priority(task.priority),
                Style::default().fg(priority_color(task.priority)),
            ),
            Span::raw(format!(" | {}", format_due_relative(task.due_date, today))),
        ];
        if !task.subtasks.is_empty() {
            meta.push(Span::raw(format!(
                " | {}/{}",
                task.completed_subtasks(),
                task.subtasks.len()
            )));
        }

        let footer = if self.board.is_pending(task.id) {
            Line::from(Span::styled("saving...", Style::default().fg(Color::Yellow)))
        } else {
            let project = task
                .project
                .map(|id| {
                    self.projects
                        .iter()
                        .find(|p| p.id == id)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| short_id(id))
                })
                .unwrap_or_else(|| short_id(task.id));
            Line::from(truncate(&project, width))
        };

        let text = vec![
            Line::from(truncate(&task.title, width)),
            Line::from(meta),
            footer,
        ];
        let card = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL))
            .style(style);
        f.render_widget(card, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let text = if self.state == AppState::Filter {
            format!("Filter: {} | Type to search, Enter to apply, Esc to cancel", self.filter_text)
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let total: usize = (0..Status::ALL.len()).map(|c| self.column_tasks(c).len()).sum();
            let filter = if self.filter_text.is_empty() {
                String::new()
            } else {
                format!(" [Filter: {}]", self.filter_text)
            };
            format!("Tasks: {total}{filter} | h: Help")
        };
        let status = Status::from_column(self.selected_column).unwrap_or_default();
        let style = if self.status_is_error {
            Style::default().bg(DARK_RED).fg(Color::White)
        } else {
            Style::default().bg(status_color(status)).fg(text_on(status))
        };
        f.render_widget(Paragraph::new(text).style(style), area);
    }

    fn render_task_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let area = centered_rect(80, 80, f.area());
        f.render_widget(Clear, area);

        let today = Local::now().date_naive();
        let project = task
            .project
            .map(|id| {
                self.projects
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| format!("{id} (deleted)"))
            })
            .unwrap_or_else(|| "-".to_string());

        let mut lines = vec![
            Line::from(Span::styled(
                format!("{}  {}", short_id(task.id), task.title),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Status:   {}", format_status(task.status))),
            Line::from(format!("Priority: {}", format_priority(task.priority))),
            Line::from(format!(
                "Due:      {}",
                task.due_date
                    .map(|d| format!("{d} ({})", format_due_relative(Some(d), today)))
                    .unwrap_or_else(|| "-".to_string())
            )),
            Line::from(format!("Project:  {project}")),
            Line::from(format!("Created:  {}", task.created_at.format("%Y-%m-%d %H:%M"))),
            Line::from(""),
            Line::from("Description:"),
            Line::from(task.description.clone().unwrap_or_else(|| "-".to_string())),
        ];
        if !task.subtasks.is_empty() {
            lines.push(Line::from(""));
            lines.push(Line::from("Subtasks (press 1-9 to toggle):"));
            for (i, sub) in task.subtasks.iter().enumerate() {
                let mark = if sub.completed { "[x]" } else { "[ ]" };
                lines.push(Line::from(format!(" {}. {mark} {}", i + 1, sub.title)));
            }
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Enter to close, Space to complete)")
            .title_alignment(Alignment::Center)
            .border_style(
                Style::default()
                    .fg(status_color(task.status))
                    .add_modifier(Modifier::BOLD),
            );
        let popup = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, area);
    }

    fn render_form(&self, f: &mut Frame) {
        let Some(form) = self.form.as_ref() else {
            return;
        };
        let area = centered_rect(70, 60, f.area());
        f.render_widget(Clear, area);

        let mut lines = Vec::new();
        for (i, (label, value)) in form.rows().into_iter().enumerate() {
            let style = if i == form.current_field {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::styled(format!("{label:<12}"), style),
                Span::raw(value),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(
            "Tab/↑↓: Field | ←/→: Cursor or choice | Enter: Save | Esc: Cancel",
        ));

        let title = if form.editing.is_some() { "Edit Task" } else { "New Task" };
        let popup = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_alignment(Alignment::Center),
            )
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, area);
    }

    fn render_prompt(&self, f: &mut Frame, title: &str) {
        let area = centered_rect(60, 20, f.area());
        f.render_widget(Clear, area);
        let popup = Paragraph::new(self.subtask_input.value.as_str())
            .block(Block::default().borders(Borders::ALL).title(title.to_string()))
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, area);
    }

    fn render_confirm(&self, f: &mut Frame) {
        let title = self
            .selected_task()
            .map(|t| truncate(&t.title, 40))
            .unwrap_or_default();
        let area = centered_rect(50, 20, f.area());
        f.render_widget(Clear, area);
        let popup = Paragraph::new(format!("Delete '{title}'? (y/N)"))
            .block(Block::default().borders(Borders::ALL).title("Confirm"))
            .alignment(Alignment::Center)
            .style(Style::default().bg(Color::Black).fg(Color::LightRed));
        f.render_widget(popup, area);
    }

    fn render_help(&self, f: &mut Frame) {
        let area = centered_rect(60, 50, f.area());
        f.render_widget(Clear, area);
        let lines: Vec<Line> = HELP.split(" | ").map(Line::from).collect();
        let popup = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Help (any key to close)"))
            .style(Style::default().bg(Color::Black));
        f.render_widget(popup, area);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::task::TaskDraft;

    fn task(title: &str) -> Task {
        let draft = TaskDraft {
            title: Some(title.into()),
            ..TaskDraft::default()
        };
        Task::create(Uuid::new_v4(), draft.validate().unwrap(), Utc::now())
    }

    fn app(tasks: Vec<Task>) -> KanbanApp {
        // Nothing listens on the discard port; worker results are never drained here.
        let client = ApiClient::new("http://127.0.0.1:9", Some("token".into()));
        let session = Session::anonymous("http://127.0.0.1:9");
        KanbanApp::new(client, &session, tasks, Vec::new())
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn api_error(status: u16) -> ClientError {
        ClientError::Api {
            status,
            code: "x".into(),
            message: "boom".into(),
        }
    }

    #[test]
    fn move_is_shown_before_the_server_answers() {
        let t = task("Card");
        let id = t.id;
        let mut app = app(vec![t]);

        app.handle_key(key(KeyCode::Right, KeyModifiers::CONTROL));
        assert_eq!(app.board.task(id).unwrap().status, Status::InProgress);
        assert!(app.board.is_pending(id));
        assert_eq!(app.selected_column, 1);
        assert_eq!(app.selected_task_id(), Some(id));

        app.handle_outcome(Outcome::Moved {
            id,
            result: Err(api_error(500)),
        });
        assert_eq!(app.board.task(id).unwrap().status, Status::Todo);
        assert!(app.status_is_error);
        assert!(app.status_message.contains("restored to To Do"));
    }

    #[test]
    fn confirmed_move_adopts_server_copy() {
        let t = task("Card");
        let id = t.id;
        let mut app = app(vec![t.clone()]);
        app.handle_key(key(KeyCode::Char(' '), KeyModifiers::NONE));
        assert_eq!(app.board.task(id).unwrap().status, Status::Done);

        let mut server = t;
        server.status = Status::Done;
        server.title = "Card v2".into();
        app.handle_outcome(Outcome::Moved { id, result: Ok(server) });
        assert_eq!(app.board.task(id).unwrap().title, "Card v2");
        assert_eq!(app.board.pending_count(), 0);
    }

    #[test]
    fn rejected_token_ends_the_board() {
        let t = task("Card");
        let id = t.id;
        let mut app = app(vec![t]);
        app.handle_key(key(KeyCode::Right, KeyModifiers::SHIFT));
        app.handle_outcome(Outcome::Moved {
            id,
            result: Err(api_error(401)),
        });
        assert_eq!(app.exit, Some(BoardExit::SessionExpired));
        assert_eq!(app.board.task(id).unwrap().status, Status::Todo);
    }

    #[test]
    fn card_in_flight_cannot_be_deleted() {
        let t = task("Card");
        let id = t.id;
        let mut app = app(vec![t.clone()]);
        app.handle_key(key(KeyCode::Right, KeyModifiers::CONTROL));

        app.handle_key(key(KeyCode::Char('d'), KeyModifiers::NONE));
        assert_eq!(app.state, AppState::Board);
        assert!(app.status_is_error);

        // Even if a delete lands before the move answer, the card stays gone.
        app.handle_outcome(Outcome::Deleted { id, result: Ok(()) });
        let mut server = t;
        server.status = Status::InProgress;
        app.handle_outcome(Outcome::Moved { id, result: Ok(server) });
        assert!(app.board.task(id).is_none());
    }

    #[test]
    fn reload_started_before_a_confirm_keeps_the_move() {
        let t = task("Card");
        let id = t.id;
        let mut app = app(vec![t.clone()]);
        let since = app.board.revision();
        app.handle_key(key(KeyCode::Right, KeyModifiers::CONTROL));
        let mut server = t.clone();
        server.status = Status::InProgress;
        app.handle_outcome(Outcome::Moved { id, result: Ok(server) });

        app.handle_outcome(Outcome::Reloaded {
            since,
            result: Ok((vec![t], Vec::new())),
        });
        assert_eq!(app.board.task(id).unwrap().status, Status::InProgress);
    }

    #[test]
    fn invalid_form_stays_open() {
        let mut app = app(Vec::new());
        app.handle_key(key(KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(app.state, AppState::AddTask);
        app.handle_key(key(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(app.state, AppState::AddTask);
        assert!(app.status_message.contains("Title is required"));
        app.handle_key(key(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(app.state, AppState::Board);
        assert!(app.form.is_none());
    }

    #[test]
    fn filter_narrows_columns() {
        let mut app = app(vec![task("Write docs"), task("Deploy")]);
        app.handle_key(key(KeyCode::Char('/'), KeyModifiers::NONE));
        for c in "dep".chars() {
            app.handle_key(key(KeyCode::Char(c), KeyModifiers::NONE));
        }
        app.handle_key(key(KeyCode::Enter, KeyModifiers::NONE));
        let shown = app.column_tasks(0);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Deploy");
    }

    #[test]
    fn events_update_idle_cards() {
        let t = task("Card");
        let mut app = app(vec![t.clone()]);
        let mut remote = t.clone();
        remote.status = Status::Done;
        app.handle_outcome(Outcome::Event(TaskEvent::Updated(remote)));
        assert_eq!(app.column_tasks(2).len(), 1);
        app.handle_outcome(Outcome::Event(TaskEvent::Deleted {
            id: t.id,
            owner: t.owner,
        }));
        assert!(app.board.task(t.id).is_none());
    }

    #[test]
    fn renders_columns_and_cards() {
        let mut app = app(vec![task("Ship release")]);
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| app.render(f)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("To Do (1)"));
        assert!(screen.contains("In Progress (0)"));
        assert!(screen.contains("Ship release"));
    }
}

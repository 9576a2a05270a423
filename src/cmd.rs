//! Command implementations for the CLI interface.
//!
//! `serve` runs the REST server in-process. Every other command is a client of
//! that server, authenticated by the session saved under `~/.taskboard/`.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use clap_complete::{generate, Shell};
use uuid::Uuid;

use crate::client::{ApiClient, ClientError};
use crate::config::{AppConfig, Overrides};
use crate::display::*;
use crate::fields::*;
use crate::project::{ProjectDraft, ProjectPatchDraft};
use crate::session::Session;
use crate::task::*;
use crate::tui::enums::BoardExit;
use crate::tui::kanban::KanbanApp;
use crate::tui::run::run_board;
use crate::user::*;
use crate::{logging, server};

#[derive(Subcommand)]
pub enum Commands {
    /// Run the REST server.
    Serve {
        /// YAML configuration file (defaults to ./taskboard.yaml when present).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Address to listen on, e.g. 0.0.0.0:5000.
        #[arg(long)]
        bind: Option<String>,
        /// JSON store file; omit to keep everything in memory.
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Launch the kanban board interface.
    Board,

    /// Create an account and log in.
    Register {
        name: String,
        email: String,
        /// Prompted for when omitted.
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long, value_enum)]
        role: Option<Role>,
    },

    /// Log in and remember the session.
    Login {
        email: String,
        /// Prompted for when omitted.
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the saved session.
    Logout,

    /// Show the logged-in user.
    Whoami,

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum, default_value_t = Status::Todo)]
        status: Status,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "friday", "in 3d", ...
        #[arg(long)]
        due: Option<String>,
        /// Project name or id.
        #[arg(long)]
        project: Option<String>,
        /// Subtask title. May be repeated.
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
    },

    /// List tasks with optional filters.
    List {
        /// Include completed tasks.
        #[arg(long)]
        all: bool,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Project name or id.
        #[arg(long)]
        project: Option<String>,
        /// Due filter: today | this-week | overdue | none.
        #[arg(long, value_enum)]
        due: Option<DueFilter>,
        #[arg(long, value_enum, default_value_t = SortKey::Due)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Unfinished tasks due within the next few days.
    DueSoon,

    /// View a single task by id, id prefix or title.
    View { id: String },

    /// Update fields on a task.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_desc")]
        desc: Option<String>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long, conflicts_with = "clear_project")]
        project: Option<String>,
        #[arg(long)]
        clear_desc: bool,
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        clear_project: bool,
    },

    /// Flip a task between done and todo.
    Toggle { id: String },

    /// Delete a task.
    Delete { id: String },

    /// Manage a task's subtasks.
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },

    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Show or change your display name.
    Profile {
        #[arg(long)]
        name: Option<String>,
    },

    /// Show or change productivity preferences.
    Prefs {
        /// Start of the working day, HH:MM.
        #[arg(long)]
        work_start: Option<String>,
        /// End of the working day, HH:MM.
        #[arg(long)]
        work_end: Option<String>,
        /// Focus session length in minutes.
        #[arg(long)]
        focus: Option<u32>,
        /// Break length in minutes.
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        /// Working days, comma-separated.
        #[arg(long, value_delimiter = ',')]
        days: Option<Vec<String>>,
    },

    /// Change your password.
    Password {
        #[arg(long)]
        current: Option<String>,
        #[arg(long)]
        new: Option<String>,
    },

    /// Task counts and completion rate.
    Stats,

    /// Delete your account and everything you own.
    DeleteAccount {
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SubtaskAction {
    /// Append a subtask.
    Add { task: String, title: String },
    /// Mark a subtask done (or not, with --undo).
    Done {
        task: String,
        /// 1-based position, id prefix or title.
        subtask: String,
        #[arg(long)]
        undo: bool,
    },
    /// Rename a subtask.
    Rename {
        task: String,
        subtask: String,
        title: String,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    List,
    Add {
        name: String,
        #[arg(long)]
        desc: Option<String>,
        /// Hex colour, e.g. #3498db.
        #[arg(long)]
        color: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "clear_desc")]
        desc: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        clear_desc: bool,
    },
    Delete { id: String },
}

/// The saved session plus where it lives.
pub struct Ctx {
    pub session: Session,
    pub session_path: PathBuf,
}

impl Ctx {
    pub fn hydrate(server: Option<&str>) -> Result<Self> {
        let session_path = Session::default_path();
        let session = Session::hydrate(&session_path, server)?;
        Ok(Self {
            session,
            session_path,
        })
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::from_session(&self.session)
    }

    pub fn save(&self) -> Result<()> {
        self.session.save(&self.session_path)?;
        Ok(())
    }

    /// Drop the credentials after the server refused them.
    pub fn expire(&mut self) -> Result<()> {
        self.session.clear();
        self.save()
    }
}

/// Run a client command. A rejected token clears the saved session.
pub fn run(command: Commands, server: Option<&str>) -> Result<()> {
    match command {
        Commands::Serve { config, bind, store } => return cmd_serve(config, bind, store),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            return Ok(());
        }
        _ => {}
    }

    let mut ctx = Ctx::hydrate(server)?;
    let result = dispatch(&mut ctx, command);
    if let Err(err) = &result {
        let rejected = err
            .downcast_ref::<ClientError>()
            .is_some_and(ClientError::is_unauthenticated);
        if rejected && ctx.session.is_authenticated() {
            ctx.expire()?;
            eprintln!("Session expired; log in again with `tb login`.");
        }
    }
    result
}

fn dispatch(ctx: &mut Ctx, command: Commands) -> Result<()> {
    match command {
        Commands::Serve { .. } | Commands::Completions { .. } => Ok(()),
        Commands::Board => cmd_board(ctx),
        Commands::Register {
            name,
            email,
            password,
            role,
        } => cmd_register(ctx, name, email, password, role),
        Commands::Login { email, password } => cmd_login(ctx, email, password),
        Commands::Logout => cmd_logout(ctx),
        Commands::Whoami => cmd_whoami(ctx),
        Commands::Add {
            title,
            desc,
            status,
            priority,
            due,
            project,
            subtasks,
        } => cmd_add(ctx, title, desc, status, priority, due, project, subtasks),
        Commands::List {
            all,
            status,
            priority,
            project,
            due,
            sort,
            limit,
        } => cmd_list(ctx, all, status, priority, project, due, sort, limit),
        Commands::DueSoon => cmd_due_soon(ctx),
        Commands::View { id } => cmd_view(ctx, id),
        Commands::Update {
            id,
            title,
            desc,
            status,
            priority,
            due,
            project,
            clear_desc,
            clear_due,
            clear_project,
        } => {
            let patch = TaskPatchDraft {
                title,
                description: clearable(desc, clear_desc),
                status: status.map(|s| s.to_string()),
                priority: priority.map(|p| p.to_string()),
                due_date: clearable(due.map(|d| normalise_due(&d)), clear_due),
                project: None,
                subtasks: None,
            };
            cmd_update(ctx, id, patch, clearable(project, clear_project))
        }
        Commands::Toggle { id } => cmd_toggle(ctx, id),
        Commands::Delete { id } => cmd_delete(ctx, id),
        Commands::Subtask { action } => cmd_subtask(ctx, action),
        Commands::Project { action } => cmd_project(ctx, action),
        Commands::Profile { name } => cmd_profile(ctx, name),
        Commands::Prefs {
            work_start,
            work_end,
            focus,
            break_minutes,
            days,
        } => cmd_prefs(
            ctx,
            PreferencesPatch {
                work_hours_start: work_start,
                work_hours_end: work_end,
                focus_session_duration: focus,
                break_duration: break_minutes,
                preferred_work_days: days,
            },
        ),
        Commands::Password { current, new } => cmd_password(ctx, current, new),
        Commands::Stats => cmd_stats(ctx),
        Commands::DeleteAccount { password } => cmd_delete_account(ctx, password),
    }
}

/// `Some(None)` clears a field; `Some(Some(v))` sets it; `None` leaves it alone.
fn clearable<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

/// Resolve natural-language dates locally; anything else goes to the server as
/// typed so it can explain what is wrong.
fn normalise_due(raw: &str) -> String {
    parse_due_input(raw)
        .map(|d| d.to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn secret(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => prompt(label),
    }
}

fn resolve_task(client: &ApiClient, identifier: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return Ok(id);
    }
    let tasks = client.list_tasks(&TaskQuery::default())?;
    resolve_task_identifier(identifier, &tasks).map_err(|e| anyhow!(e))
}

fn resolve_project(client: &ApiClient, identifier: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return Ok(id);
    }
    let projects = client.list_projects()?;
    resolve_project_identifier(identifier, &projects).map_err(|e| anyhow!(e))
}

/// Subtasks are addressed by 1-based position, id prefix or exact title.
fn resolve_subtask(task: &Task, identifier: &str) -> Result<Uuid> {
    if let Ok(n) = identifier.parse::<usize>() {
        if let Some(sub) = n.checked_sub(1).and_then(|i| task.subtasks.get(i)) {
            return Ok(sub.id);
        }
    }
    let needle = identifier.to_lowercase();
    let matches: Vec<Uuid> = task
        .subtasks
        .iter()
        .filter(|s| {
            s.title.to_lowercase() == needle
                || (!needle.is_empty() && s.id.simple().to_string().starts_with(&needle))
        })
        .map(|s| s.id)
        .collect();
    match matches.as_slice() {
        [one] => Ok(*one),
        [] => Err(anyhow!("No subtask matching '{identifier}' on '{}'", task.title)),
        _ => Err(anyhow!("Multiple subtasks match '{identifier}'; use the position instead")),
    }
}

fn announce(session: &Session) {
    if let Some(user) = &session.user {
        println!("Logged in as {} <{}> on {}", user.name, user.email, session.server);
    }
}

/// Run the REST server until Ctrl+C.
pub fn cmd_serve(config: Option<PathBuf>, bind: Option<String>, store: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config.as_deref(), Overrides { bind, store })?;
    logging::init(&config.logging);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting the async runtime")?;
    runtime.block_on(server::serve(config))
}

/// Launch the kanban board.
pub fn cmd_board(ctx: &mut Ctx) -> Result<()> {
    let app = KanbanApp::connect(&ctx.session)?;
    match run_board(app)? {
        BoardExit::Quit => Ok(()),
        BoardExit::SessionExpired => {
            ctx.expire()?;
            eprintln!("Session expired; log in again with `tb login`.");
            Ok(())
        }
    }
}

pub fn cmd_register(
    ctx: &mut Ctx,
    name: String,
    email: String,
    password: Option<String>,
    role: Option<Role>,
) -> Result<()> {
    let draft = RegisterDraft {
        name: Some(name),
        email: Some(email),
        password: Some(secret(password, "Password")?),
        role: role.map(|r| match r {
            Role::User => "user".to_string(),
            Role::Admin => "admin".to_string(),
        }),
    };
    let auth = ApiClient::new(ctx.session.server.clone(), None).register(&draft)?;
    ctx.session.login(auth.token, auth.user);
    ctx.save()?;
    println!("Registered.");
    announce(&ctx.session);
    Ok(())
}

pub fn cmd_login(ctx: &mut Ctx, email: String, password: Option<String>) -> Result<()> {
    let draft = LoginDraft {
        email: Some(email),
        password: Some(secret(password, "Password")?),
    };
    let auth = ApiClient::new(ctx.session.server.clone(), None).login(&draft)?;
    ctx.session.login(auth.token, auth.user);
    ctx.save()?;
    announce(&ctx.session);
    Ok(())
}

pub fn cmd_logout(ctx: &mut Ctx) -> Result<()> {
    ctx.session.clear();
    ctx.save()?;
    println!("Logged out.");
    Ok(())
}

pub fn cmd_whoami(ctx: &mut Ctx) -> Result<()> {
    let user = ctx.client().current_user()?;
    println!("Name:        {}", user.name);
    println!("Email:       {}", user.email);
    println!("Role:        {:?}", user.role);
    println!("Member since {}", user.created_at.format("%Y-%m-%d"));
    if let Some(last) = user.last_login {
        println!("Last login:  {}", last.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("Server:      {}", ctx.session.server);
    ctx.session.user = Some(user);
    ctx.save()
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    ctx: &mut Ctx,
    title: String,
    desc: Option<String>,
    status: Status,
    priority: Priority,
    due: Option<String>,
    project: Option<String>,
    subtasks: Vec<String>,
) -> Result<()> {
    let client = ctx.client();
    let project = project
        .map(|p| resolve_project(&client, &p))
        .transpose()?;
    let draft = TaskDraft {
        title: Some(title),
        description: desc,
        status: Some(status.to_string()),
        priority: Some(priority.to_string()),
        due_date: due.map(|d| normalise_due(&d)),
        project: project.map(|id| id.to_string()),
        subtasks: subtasks
            .into_iter()
            .map(|title| SubtaskDraft {
                title: Some(title),
                ..SubtaskDraft::default()
            })
            .collect(),
    };
    let task = client.create_task(&draft)?;
    println!("Added task {}: {}", short_id(task.id), task.title);
    Ok(())
}

fn due_matches(filter: DueFilter, due: Option<NaiveDate>, today: NaiveDate) -> bool {
    let (week_start, week_end) = start_end_of_this_week(today);
    match (filter, due) {
        (DueFilter::None, due) => due.is_none(),
        (_, None) => false,
        (DueFilter::Today, Some(d)) => d == today,
        (DueFilter::ThisWeek, Some(d)) => d >= week_start && d <= week_end,
        (DueFilter::Overdue, Some(d)) => d < today,
    }
}

fn priority_rank(p: Priority) -> u8 {
    match p {
        Priority::High => 0,
        Priority::Medium => 1,
        Priority::Low => 2,
    }
}

/// Client-side narrowing on top of the server's status/priority/project filter.
fn select_tasks(
    tasks: Vec<Task>,
    include_done: bool,
    due: Option<DueFilter>,
    sort: SortKey,
    today: NaiveDate,
) -> Vec<Task> {
    let mut selected: Vec<Task> = tasks
        .into_iter()
        .filter(|t| include_done || t.status != Status::Done)
        .filter(|t| due.map_or(true, |f| due_matches(f, t.due_date, today)))
        .collect();
    match sort {
        // Server order already.
        SortKey::Due => {}
        SortKey::Priority => selected.sort_by_key(|t| priority_rank(t.priority)),
        SortKey::Created => selected.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
    selected
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_list(
    ctx: &mut Ctx,
    all: bool,
    status: Option<Status>,
    priority: Option<Priority>,
    project: Option<String>,
    due: Option<DueFilter>,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    let client = ctx.client();
    let project = project
        .map(|p| resolve_project(&client, &p))
        .transpose()?;
    let query = TaskQuery {
        status: status.map(|s| s.to_string()),
        priority: priority.map(|p| p.to_string()),
        project: project.map(|id| id.to_string()),
    };
    let tasks = client.list_tasks(&query)?;
    let projects = client.list_projects()?;

    let today = Local::now().date_naive();
    let mut tasks = select_tasks(tasks, all || status.is_some(), due, sort, today);
    if let Some(n) = limit {
        tasks.truncate(n);
    }
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    let rows: Vec<&Task> = tasks.iter().collect();
    print_table(&rows, &projects);
    Ok(())
}

pub fn cmd_due_soon(ctx: &mut Ctx) -> Result<()> {
    let client = ctx.client();
    let tasks = client.due_soon()?;
    if tasks.is_empty() {
        println!("Nothing due soon.");
        return Ok(());
    }
    let projects = client.list_projects()?;
    let rows: Vec<&Task> = tasks.iter().collect();
    print_table(&rows, &projects);
    Ok(())
}

/// View detailed information about a specific task.
pub fn cmd_view(ctx: &mut Ctx, id: String) -> Result<()> {
    let client = ctx.client();
    let task = client.get_task(resolve_task(&client, &id)?)?;
    let project = match task.project {
        Some(pid) => client
            .list_projects()?
            .into_iter()
            .find(|p| p.id == pid)
            .map(|p| p.name)
            .unwrap_or_else(|| format!("{pid} (deleted)")),
        None => "-".into(),
    };
    let today = Local::now().date_naive();
    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", format_status(task.status));
    println!("Priority:     {}", format_priority(task.priority));
    println!("Project:      {project}");
    println!(
        "Due:          {}",
        match task.due_date {
            Some(d) => format!("{d} ({})", format_due_relative(Some(d), today)),
            None => "-".into(),
        }
    );
    println!("Created UTC:  {}", task.created_at.to_rfc3339());
    println!("Updated UTC:  {}", task.updated_at.to_rfc3339());
    println!("Description:\n{}\n", task.description.as_deref().unwrap_or("-"));
    if task.subtasks.is_empty() {
        println!("Subtasks: -");
    } else {
        println!(
            "Subtasks ({}/{} done):",
            task.completed_subtasks(),
            task.subtasks.len()
        );
        for (i, sub) in task.subtasks.iter().enumerate() {
            let mark = if sub.completed { "x" } else { " " };
            println!("  {}. [{mark}] {} ({})", i + 1, sub.title, short_id(sub.id));
        }
    }
    Ok(())
}

pub fn cmd_update(
    ctx: &mut Ctx,
    id: String,
    mut patch: TaskPatchDraft,
    project: Option<Option<String>>,
) -> Result<()> {
    let client = ctx.client();
    let task_id = resolve_task(&client, &id)?;
    patch.project = match project {
        Some(Some(p)) => Some(Some(resolve_project(&client, &p)?.to_string())),
        Some(None) => Some(None),
        None => None,
    };
    let task = client.update_task(task_id, &patch)?;
    println!("Updated task {}: {}", short_id(task.id), task.title);
    Ok(())
}

pub fn cmd_toggle(ctx: &mut Ctx, id: String) -> Result<()> {
    let client = ctx.client();
    let task = client.toggle_complete(resolve_task(&client, &id)?)?;
    println!("{} is now {}", task.title, format_status(task.status));
    Ok(())
}

pub fn cmd_delete(ctx: &mut Ctx, id: String) -> Result<()> {
    let client = ctx.client();
    let task_id = resolve_task(&client, &id)?;
    client.delete_task(task_id)?;
    println!("Deleted task {}.", short_id(task_id));
    Ok(())
}

pub fn cmd_subtask(ctx: &mut Ctx, action: SubtaskAction) -> Result<()> {
    let client = ctx.client();
    let task = match action {
        SubtaskAction::Add { task, title } => {
            let id = resolve_task(&client, &task)?;
            client.add_subtask(id, &title)?
        }
        SubtaskAction::Done {
            task,
            subtask,
            undo,
        } => {
            let task = client.get_task(resolve_task(&client, &task)?)?;
            let sub = resolve_subtask(&task, &subtask)?;
            let patch = SubtaskPatch {
                completed: Some(!undo),
                title: None,
            };
            client.set_subtask(task.id, sub, &patch)?
        }
        SubtaskAction::Rename {
            task,
            subtask,
            title,
        } => {
            let task = client.get_task(resolve_task(&client, &task)?)?;
            let sub = resolve_subtask(&task, &subtask)?;
            let patch = SubtaskPatch {
                completed: None,
                title: Some(title),
            };
            client.set_subtask(task.id, sub, &patch)?
        }
    };
    println!(
        "{}: {}/{} subtasks done",
        task.title,
        task.completed_subtasks(),
        task.subtasks.len()
    );
    Ok(())
}

pub fn cmd_project(ctx: &mut Ctx, action: ProjectAction) -> Result<()> {
    let client = ctx.client();
    match action {
        ProjectAction::List => {
            let projects = client.list_projects()?;
            if projects.is_empty() {
                println!("No projects.");
            }
            for p in projects {
                println!(
                    "{:<9} {:<8} {}{}",
                    short_id(p.id),
                    p.color,
                    p.name,
                    p.description.map(|d| format!(" - {d}")).unwrap_or_default()
                );
            }
        }
        ProjectAction::Add { name, desc, color } => {
            let project = client.create_project(&ProjectDraft {
                name: Some(name),
                description: desc,
                color,
            })?;
            println!("Added project {}: {}", short_id(project.id), project.name);
        }
        ProjectAction::Update {
            id,
            name,
            desc,
            color,
            clear_desc,
        } => {
            let id = resolve_project(&client, &id)?;
            let project = client.update_project(
                id,
                &ProjectPatchDraft {
                    name,
                    description: clearable(desc, clear_desc),
                    color,
                },
            )?;
            println!("Updated project {}: {}", short_id(project.id), project.name);
        }
        ProjectAction::Delete { id } => {
            let id = resolve_project(&client, &id)?;
            client.delete_project(id)?;
            println!("Deleted project {}.", short_id(id));
        }
    }
    Ok(())
}

fn print_preferences(prefs: &ProductivityPreferences) {
    println!("Work hours:  {} - {}", prefs.work_hours_start, prefs.work_hours_end);
    println!("Focus:       {} min", prefs.focus_session_duration);
    println!("Break:       {} min", prefs.break_duration);
    println!("Work days:   {}", prefs.preferred_work_days.join(", "));
}

pub fn cmd_profile(ctx: &mut Ctx, name: Option<String>) -> Result<()> {
    let client = ctx.client();
    let user = match name {
        Some(name) => client.update_profile(&ProfilePatch {
            name: Some(name),
            productivity_preferences: None,
        })?,
        None => client.current_user()?,
    };
    println!("Name:        {}", user.name);
    println!("Email:       {}", user.email);
    print_preferences(&user.productivity_preferences);
    ctx.session.user = Some(user);
    ctx.save()
}

pub fn cmd_prefs(ctx: &mut Ctx, patch: PreferencesPatch) -> Result<()> {
    let client = ctx.client();
    let prefs = if patch == PreferencesPatch::default() {
        client.current_user()?.productivity_preferences
    } else {
        client.update_preferences(&patch)?
    };
    print_preferences(&prefs);
    Ok(())
}

pub fn cmd_password(ctx: &mut Ctx, current: Option<String>, new: Option<String>) -> Result<()> {
    let draft = PasswordChangeDraft {
        current_password: Some(secret(current, "Current password")?),
        new_password: Some(secret(new, "New password")?),
    };
    ctx.client().change_password(&draft)?;
    println!("Password updated.");
    Ok(())
}

pub fn cmd_stats(ctx: &mut Ctx) -> Result<()> {
    let stats = ctx.client().stats()?;
    println!("Total:        {}", stats.total);
    println!("To Do:        {}", stats.todo);
    println!("In Progress:  {}", stats.in_progress);
    println!("Done:         {}", stats.done);
    println!("Overdue:      {}", stats.overdue);
    println!("Completion:   {}%", stats.completion_rate);
    Ok(())
}

pub fn cmd_delete_account(ctx: &mut Ctx, password: Option<String>) -> Result<()> {
    let draft = AccountDeletionDraft {
        password: Some(secret(password, "Password")?),
    };
    ctx.client().delete_account(&draft)?;
    ctx.session.clear();
    ctx.save()?;
    println!("Account deleted.");
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut io::stdout());
}

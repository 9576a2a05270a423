//! # taskboard
//!
//! A personal task board: a REST server with accounts, ownership-scoped tasks
//! and projects, a command-line client, and a kanban terminal interface with
//! optimistic card moves.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run the server (in memory, or persisted with --store)
//! tb serve --store ~/.taskboard/data.json
//!
//! # Create an account; the session is saved in ~/.taskboard/session.json
//! tb register "Alice" alice@example.com
//!
//! # Add and list tasks
//! tb add "Ship release" --priority high --due friday
//! tb list
//!
//! # Open the board
//! tb board
//! ```
//!
//! ## Server configuration
//!
//! Defaults, then `taskboard.yaml` (or `--config`), then `TASKBOARD__*`
//! environment variables (`TASKBOARD__AUTH__JWT_SECRET`, `TASKBOARD__SERVER__BIND`),
//! then `--bind`/`--store`. Without a configured JWT secret tokens only live as
//! long as the server process.
//!
//! ## Key Commands
//!
//! - `tb board` - kanban board; Ctrl+←/→ moves a card, Space completes it
//! - `tb add <title>` - create a task
//! - `tb list` - filtered task table
//! - `tb view <id>` - task detail with subtasks
//! - `tb subtask add|done|rename` - embedded checklist items
//! - `tb project list|add|update|delete`
//! - `tb stats` - counts and completion rate
//!
//! Tasks are addressed by full id, a unique id prefix, or their exact title.

use clap::Parser;

pub mod auth;
pub mod board;
pub mod cli;
pub mod client;
pub mod cmd;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod events;
pub mod fields;
pub mod guard;
pub mod logging;
pub mod project;
pub mod server;
pub mod service;
pub mod session;
pub mod task;
pub mod user;
pub mod validate;
pub mod api {
    pub mod middleware;
    pub mod routes;
    pub mod handlers {
        pub mod auth;
        pub mod events;
        pub mod projects;
        pub mod tasks;
        pub mod users;
    }
}
pub mod tui {
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod kanban;
    pub mod run;
    pub mod task_form;
    pub mod utils;
}

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli.command, cli.server.as_deref()) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

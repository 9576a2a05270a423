use clap::Parser;

use crate::cmd::Commands;

/// Task board: REST server, command-line client and kanban TUI.
/// The client talks to the server named by --server or the saved session.
#[derive(Parser)]
#[command(name = "tb", version, about = "Personal task board")]
pub struct Cli {
    /// Server base URL, e.g. http://127.0.0.1:5000.
    #[arg(long, global = true, env = "TASKBOARD_SERVER")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

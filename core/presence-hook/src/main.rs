//! cc-presence: Discord Rich Presence for Claude Code.
//!
//! Called directly by Claude Code hooks configured in `~/.claude/settings.json`.
//!
//! ## Subcommands
//!
//! - `start`: SessionStart hook, spawns the daemon if none is alive
//! - `notify`: PreToolUse hook, records the current activity
//! - `stop`: Stop/SessionEnd hook, clears presence and ends the daemon
//! - `status`: prints the current session
//! - `statusline`: status line command, feeds model/token data into the session
//! - `daemon`: long-lived presence process (spawned internally)
//!
//! ## Exit Codes
//!
//! `notify` and `statusline` always exit 0 so they can never break the host's
//! tool pipeline. `start` and `status` exit 1 on local storage errors.

mod daemon;
mod input;
mod logging;
mod notify;
mod start;
mod status;
mod statusline;
mod stop;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cc-presence")]
#[command(about = "Discord Rich Presence for Claude Code sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking a session (reads hook JSON from stdin if no project is given)
    Start {
        /// Project name shown on the presence card
        #[arg(value_name = "PROJECT")]
        project: Option<String>,
    },

    /// Record a tool invocation (reads hook JSON from stdin if no tool is given)
    Notify {
        /// Tool name, e.g. Edit or Bash
        #[arg(value_name = "TOOL")]
        tool_name: Option<String>,

        /// Tool arguments as JSON
        #[arg(value_name = "ARGS")]
        tool_args: Option<String>,
    },

    /// Clear presence and stop the daemon
    Stop,

    /// Show whether a session is active
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Status line command (reads status line JSON from stdin)
    Statusline,

    /// Presence daemon (spawned by start)
    #[command(hide = true)]
    Daemon,
}

fn main() {
    let logging_guard = logging::init();
    let cli = Cli::parse();

    let code = dispatch(cli.command);

    drop(logging_guard);
    std::process::exit(code);
}

fn dispatch(command: Commands) -> i32 {
    match command {
        Commands::Start { project } => match start::run(project) {
            Ok(_) => 0,
            Err(e) => {
                tracing::error!(error = %e, "cc-presence start failed");
                eprintln!("cc-presence: {}", e);
                1
            }
        },
        Commands::Notify {
            tool_name,
            tool_args,
        } => {
            // Best-effort side channel: log and exit 0 no matter what.
            if let Err(e) = notify::run(tool_name, tool_args) {
                tracing::warn!(error = %e, "cc-presence notify failed");
            }
            0
        }
        Commands::Stop => {
            if let Err(e) = stop::run() {
                tracing::warn!(error = %e, "cc-presence stop failed");
                eprintln!("cc-presence: {}", e);
            }
            0
        }
        Commands::Status { json } => match status::run(json) {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!(error = %e, "cc-presence status failed");
                eprintln!("cc-presence: {}", e);
                1
            }
        },
        Commands::Statusline => {
            if let Err(e) = statusline::run() {
                tracing::debug!(error = %e, "cc-presence statusline failed");
            }
            0
        }
        Commands::Daemon => match daemon::run() {
            Ok(_) => 0,
            Err(e) => {
                tracing::error!(error = %e, "cc-presence daemon failed");
                1
            }
        },
    }
}

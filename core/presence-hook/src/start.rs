//! `cc-presence start`: SessionStart hook.
//!
//! Idempotent: with a live daemon nothing changes, not even the project name.
//! A stale record (dead or recycled PID) is replaced and a new daemon spawned.

use chrono::Utc;
use presence_core::config;
use presence_core::{PresenceError, StateStore};
use std::env;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use crate::input;

#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
}

pub fn run(project: Option<String>) -> Result<StartOutcome, PresenceError> {
    let hook = if project.is_none() {
        input::read_hook_input()
    } else {
        None
    };
    let project_name = input::resolve_project_name(project, hook.as_ref());

    let store = StateStore::new(&config::data_dir()?);
    start_with(&store, &project_name, spawn_daemon)
}

fn start_with<F>(store: &StateStore, project_name: &str, spawn: F) -> Result<StartOutcome, PresenceError>
where
    F: FnOnce() -> Result<u32, PresenceError>,
{
    match store.start_session(project_name, Utc::now(), spawn) {
        Ok(record) => {
            let pid = record.daemon_pid.unwrap_or_default();
            tracing::info!(project = %project_name, pid, "Started presence daemon");
            Ok(StartOutcome::Started { pid })
        }
        Err(PresenceError::AlreadyRunning { pid }) => {
            tracing::info!(pid, "Daemon already running");
            Ok(StartOutcome::AlreadyRunning { pid })
        }
        Err(err) => Err(err),
    }
}

/// Re-executes this binary as `cc-presence daemon`, detached from the hook's
/// process group and stdio so Claude Code never waits on it.
fn spawn_daemon() -> Result<u32, PresenceError> {
    let exe = env::current_exe().map_err(|source| PresenceError::SpawnFailed { source })?;
    let child = Command::new(exe)
        .arg("daemon")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|source| PresenceError::SpawnFailed { source })?;
    Ok(child.id())
}

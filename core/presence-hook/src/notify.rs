//! `cc-presence notify`: PreToolUse hook.
//!
//! Must never fail the host's tool pipeline. Every error ends up as a log line
//! and the process exits 0.

use chrono::Utc;
use presence_core::config;
use presence_core::state::live_daemon_pid;
use presence_core::{map_tool, PresenceError, SessionRecord, StateStore};
use serde_json::Value;

use crate::input;

pub fn run(tool_name: Option<String>, tool_args: Option<String>) -> Result<(), PresenceError> {
    let (tool_name, args) = match tool_name {
        Some(name) => (name, input::parse_tool_args(tool_args.as_deref())),
        None => match input::read_hook_input() {
            Some(hook) => (
                hook.tool_name.unwrap_or_default(),
                hook.tool_input.unwrap_or(Value::Null),
            ),
            None => return Ok(()),
        },
    };

    let store = StateStore::new(&config::data_dir()?);
    record_tool_use(&store, &tool_name, &args)?;
    Ok(())
}

/// Returns the updated record, or `None` when there is no live session.
pub fn record_tool_use(
    store: &StateStore,
    tool_name: &str,
    args: &Value,
) -> Result<Option<SessionRecord>, PresenceError> {
    if tool_name.trim().is_empty() {
        tracing::debug!("Ignoring tool event without a tool name");
        return Ok(None);
    }

    let Some(record) = store.read()? else {
        tracing::debug!(tool = %tool_name, "No active session; ignoring tool event");
        return Ok(None);
    };
    if live_daemon_pid(&record).is_none() {
        tracing::debug!(tool = %tool_name, "Daemon not running; ignoring tool event");
        return Ok(None);
    }

    let activity = map_tool(tool_name, args);
    tracing::debug!(tool = %tool_name, activity = %activity.label, detail = %activity.detail, "Updated activity");
    store.update(activity, Utc::now())
}

//! Tracing setup shared by every subcommand.
//!
//! Hook invocations run with stdout wired into Claude Code, and the daemon runs
//! with null stdio, so everything goes to `<data_dir>/daemon.log` instead.
//! `CC_PRESENCE_DEBUG_LOG=1` turns on debug output; otherwise `RUST_LOG`
//! applies, defaulting to `info`.

use presence_core::config::{self, LOG_FILE};
use std::env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "CC_PRESENCE_DEBUG_LOG";

/// Installs the global subscriber. The returned guard flushes buffered lines
/// when dropped, so `main` holds it until just before exiting.
pub fn init() -> Option<WorkerGuard> {
    let dir = config::data_dir().ok()?;
    fs_err::create_dir_all(&dir).ok()?;

    let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(build_filter())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .ok()?;

    Some(guard)
}

fn build_filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

//! `cc-presence daemon`: the long-lived process spawned by `start`.
//!
//! Owns the Discord connection and runs the watchdog until the session is
//! stopped, times out, or is taken over by a newer daemon.
//!
//! ## Lifecycle
//!
//! 1. Spawned detached by `start`, which records our PID in the session record
//! 2. Polls the record every tick and pushes changes to Discord
//! 3. Exits on SIGTERM/SIGINT (from `stop`), a missing record, or idle timeout

use presence_core::config::{self, Config};
use presence_core::{DiscordPresence, ExitReason, PresenceError, StateStore, Watchdog};
use std::sync::mpsc;

pub fn run() -> Result<ExitReason, PresenceError> {
    let data_dir = config::data_dir()?;
    let config = Config::load(&data_dir).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Failed to load config; using defaults");
        Config::default()
    });
    let store = StateStore::new(&data_dir);
    let pid = std::process::id();

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let handler_tx = shutdown_tx.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = handler_tx.send(());
    }) {
        // Without a handler we still stop via the missing record on the next tick.
        tracing::warn!(error = %err, "Failed to install signal handler");
    }

    tracing::info!(pid, data_dir = %data_dir.display(), "Daemon starting");
    let mut client = DiscordPresence::new(&config);
    let reason = Watchdog::new(&store, &mut client, &config, pid).run(&shutdown_rx);
    drop(shutdown_tx);

    tracing::info!(?reason, "Daemon stopped");
    Ok(reason)
}

//! Idle Watchdog and display sync loop.
//!
//! Runs only inside the daemon. Each tick re-reads the record and decides:
//!
//! ```text
//! record missing              → Stopped     (explicit stop removed it)
//! record owned by other PID   → Superseded  (a newer daemon took over)
//! now - last_activity ≥ limit → IdleTimeout (clear card, remove record)
//! otherwise                   → Sync        (push card if it changed)
//! ```
//!
//! An unreadable record skips the sync, but the idle check still runs against
//! the last `last_activity` that was read successfully (initially the daemon's
//! start time), so a corrupt file cannot keep the daemon alive forever.
//!
//! Between ticks the loop waits on the shutdown channel, so a stop signal ends
//! it immediately rather than at the next tick.

use chrono::{DateTime, Utc};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::presence::{PresenceClient, PresenceUpdate};
use crate::state::{SessionRecord, StateStore};

#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    Sync(SessionRecord),
    IdleTimeout,
    Stopped,
    Superseded { owner: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    IdleTimeout,
    Stopped,
    Superseded,
    Shutdown,
}

/// Pure decision for one tick. Idle time is wall-clock time since the last
/// update; the number of events is irrelevant.
pub fn evaluate(
    record: Option<SessionRecord>,
    own_pid: u32,
    now: DateTime<Utc>,
    idle_timeout: Duration,
) -> TickAction {
    let Some(record) = record else {
        return TickAction::Stopped;
    };

    // A record without a PID was just created by the `start` that spawned us.
    if let Some(owner) = record.daemon_pid.filter(|owner| *owner != own_pid) {
        return TickAction::Superseded { owner };
    }

    if idle_expired(record.last_activity, now, idle_timeout) {
        return TickAction::IdleTimeout;
    }

    TickAction::Sync(record)
}

fn idle_expired(
    last_activity: DateTime<Utc>,
    now: DateTime<Utc>,
    idle_timeout: Duration,
) -> bool {
    let idle = now
        .signed_duration_since(last_activity)
        .to_std()
        .unwrap_or_default();
    idle >= idle_timeout
}

pub struct Watchdog<'a, C: PresenceClient> {
    store: &'a StateStore,
    client: &'a mut C,
    config: &'a Config,
    own_pid: u32,
    poll_interval: Duration,
    idle_timeout: Duration,
    last_seen_activity: DateTime<Utc>,
}

impl<'a, C: PresenceClient> Watchdog<'a, C> {
    pub fn new(store: &'a StateStore, client: &'a mut C, config: &'a Config, own_pid: u32) -> Self {
        Watchdog {
            store,
            client,
            config,
            own_pid,
            poll_interval: config.poll_interval(),
            idle_timeout: config.idle_timeout(),
            last_seen_activity: Utc::now(),
        }
    }

    pub fn with_intervals(mut self, poll_interval: Duration, idle_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.idle_timeout = idle_timeout;
        self
    }

    /// Runs until the session ends or `shutdown` fires (or its sender is dropped).
    pub fn run(mut self, shutdown: &Receiver<()>) -> ExitReason {
        info!(
            pid = self.own_pid,
            poll_secs = self.poll_interval.as_secs_f32(),
            idle_timeout_secs = self.idle_timeout.as_secs(),
            "Watchdog started"
        );

        loop {
            if let Some(reason) = self.tick(Utc::now()) {
                return reason;
            }

            match shutdown.recv_timeout(self.poll_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("Shutdown requested");
                    self.client.clear_activity();
                    self.client.disconnect();
                    self.release_record();
                    return ExitReason::Shutdown;
                }
            }
        }
    }

    /// One iteration. Returns `Some` when the loop must end.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<ExitReason> {
        let record = match self.store.read() {
            Ok(record) => record,
            Err(err) => {
                if idle_expired(self.last_seen_activity, now, self.idle_timeout) {
                    warn!(error = %err, "Session record unreadable past idle timeout, clearing presence");
                    self.client.clear_activity();
                    self.client.disconnect();
                    // The unparsable file is left for `stop` to remove.
                    return Some(ExitReason::IdleTimeout);
                }
                warn!(error = %err, "Failed to read session record; skipping tick");
                return None;
            }
        };

        match evaluate(record, self.own_pid, now, self.idle_timeout) {
            TickAction::Sync(record) => {
                self.last_seen_activity = record.last_activity;
                let update = PresenceUpdate::from_record(&record, self.config);
                self.client.set_activity(&update);
                None
            }
            TickAction::IdleTimeout => {
                info!(
                    idle_timeout_secs = self.idle_timeout.as_secs(),
                    "Idle timeout reached, clearing presence"
                );
                self.client.clear_activity();
                self.client.disconnect();
                self.release_record();
                Some(ExitReason::IdleTimeout)
            }
            TickAction::Stopped => {
                info!("Session record removed, stopping");
                self.client.clear_activity();
                self.client.disconnect();
                Some(ExitReason::Stopped)
            }
            TickAction::Superseded { owner } => {
                info!(owner, "Session taken over by another daemon, exiting");
                self.client.disconnect();
                Some(ExitReason::Superseded)
            }
        }
    }

    fn release_record(&self) {
        if let Err(err) = self.store.destroy_if_owned(self.own_pid) {
            warn!(error = %err, "Failed to remove session record");
        }
    }
}

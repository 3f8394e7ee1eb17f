//! `cc-presence stop`: Stop / SessionEnd hook.
//!
//! Removes the record first, then signals the daemon. The daemon clears the
//! card on its way out; if the signal is lost it notices the missing record on
//! its next tick.

use presence_core::config;
use presence_core::state::live_daemon_pid;
use presence_core::{PresenceError, StateStore};

pub fn run() -> Result<Option<u32>, PresenceError> {
    let store = StateStore::new(&config::data_dir()?);
    stop_with(&store)
}

/// Returns the PID that was signalled, if any daemon was alive.
pub fn stop_with(store: &StateStore) -> Result<Option<u32>, PresenceError> {
    let live_pid = match store.read() {
        Ok(record) => record.as_ref().and_then(live_daemon_pid),
        Err(err) => {
            tracing::warn!(error = %err, "Discarding unreadable session record");
            None
        }
    };

    let removed = store.destroy()?;

    if let Some(pid) = live_pid {
        signal_terminate(pid);
        tracing::info!(pid, "Stopped daemon");
    } else if removed {
        tracing::info!("Removed stale session record");
    } else {
        tracing::debug!("Nothing to stop");
    }
    Ok(live_pid)
}

fn signal_terminate(pid: u32) {
    // SAFETY: sending SIGTERM to a PID we just verified belongs to our daemon.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret != 0 {
        tracing::warn!(
            pid,
            error = %std::io::Error::last_os_error(),
            "Failed to signal daemon"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn stop_without_session_succeeds() {
        let temp = tempdir().unwrap();
        let store = StateStore::new(temp.path());

        assert_eq!(stop_with(&store).unwrap(), None);
        assert_eq!(stop_with(&store).unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn stop_removes_stale_record_without_signalling() {
        let temp = tempdir().unwrap();
        let store = StateStore::new(temp.path());
        store.create("proj", Utc::now()).unwrap();

        assert_eq!(stop_with(&store).unwrap(), None);
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn stop_clears_corrupt_record() {
        let temp = tempdir().unwrap();
        let store = StateStore::new(temp.path());
        fs_err::write(store.path(), "]]").unwrap();

        assert_eq!(stop_with(&store).unwrap(), None);
        assert!(!store.path().exists());
    }
}

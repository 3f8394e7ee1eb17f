//! File-backed Session State record.
//!
//! Many short-lived hook processes and one daemon share `state.json`. Two
//! rules keep them consistent:
//!
//! - **Atomic writes**: temp file + rename, so a reader never observes a
//!   half-written record.
//! - **Serialized writers**: read-modify-write sequences hold an exclusive
//!   `flock` on `state.lock` for their whole duration.
//!
//! Reads never take the lock; they see either the previous or the next
//! complete record.

use chrono::{DateTime, Utc};
use fs_err as fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::activity::Activity;
use crate::config::{LOCK_FILE, STATE_FILE};
use crate::error::{PresenceError, Result};

use super::liveness::{get_process_start_time, live_daemon_pid};
use super::types::{SessionRecord, TokenUsage, RECORD_VERSION};

pub struct StateStore {
    dir: PathBuf,
    file_path: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: &Path) -> Self {
        StateStore {
            dir: data_dir.to_path_buf(),
            file_path: data_dir.join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Reads the record. A missing file is `None`; anything unparsable is
    /// [`PresenceError::StateCorrupt`].
    pub fn read(&self) -> Result<Option<SessionRecord>> {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PresenceError::io("Failed to read state file", err)),
        };

        if content.trim().is_empty() {
            return Err(self.corrupt("file is empty"));
        }

        let record: SessionRecord =
            serde_json::from_str(&content).map_err(|err| self.corrupt(err.to_string()))?;
        if record.version != RECORD_VERSION {
            return Err(self.corrupt(format!(
                "unsupported version {} (expected {})",
                record.version, RECORD_VERSION
            )));
        }
        Ok(Some(record))
    }

    /// Creates a fresh record for `project_name`.
    ///
    /// Fails with [`PresenceError::AlreadyRunning`] when the existing record's
    /// daemon is alive. A stale record (dead or recycled PID) is overwritten.
    pub fn create(&self, project_name: &str, now: DateTime<Utc>) -> Result<SessionRecord> {
        let _lock = self.lock()?;
        self.create_locked(project_name, now)
    }

    /// Creates the record and spawns its daemon under one lock, so two racing
    /// starts cannot both spawn. `spawn` returns the daemon PID; if it fails
    /// the fresh record is removed again.
    pub fn start_session<F>(
        &self,
        project_name: &str,
        now: DateTime<Utc>,
        spawn: F,
    ) -> Result<SessionRecord>
    where
        F: FnOnce() -> Result<u32>,
    {
        let _lock = self.lock()?;
        let mut record = self.create_locked(project_name, now)?;

        let pid = match spawn() {
            Ok(pid) => pid,
            Err(err) => {
                if let Err(cleanup_err) = fs::remove_file(&self.file_path) {
                    tracing::warn!(error = %cleanup_err, "Failed to remove record after spawn failure");
                }
                return Err(err);
            }
        };

        record.daemon_pid = Some(pid);
        record.daemon_started = get_process_start_time(pid);
        self.write(&record)?;
        Ok(record)
    }

    fn create_locked(&self, project_name: &str, now: DateTime<Utc>) -> Result<SessionRecord> {
        if let Some(existing) = self.read()? {
            if let Some(pid) = live_daemon_pid(&existing) {
                return Err(PresenceError::AlreadyRunning { pid });
            }
            tracing::info!(
                stale_pid = ?existing.daemon_pid,
                project = %existing.project_name,
                "Replacing stale session record"
            );
        }

        let record = SessionRecord::new(project_name, now);
        self.write(&record)?;
        Ok(record)
    }

    /// Applies a tool event. Returns `None` (not an error) if no session exists.
    pub fn update(&self, activity: Activity, now: DateTime<Utc>) -> Result<Option<SessionRecord>> {
        self.modify(|record| record.apply(activity, now))
    }

    pub fn set_daemon(&self, pid: u32, started: Option<u64>) -> Result<Option<SessionRecord>> {
        self.modify(|record| {
            record.daemon_pid = Some(pid);
            record.daemon_started = started;
        })
    }

    pub fn set_usage(
        &self,
        model: Option<String>,
        usage: Option<TokenUsage>,
    ) -> Result<Option<SessionRecord>> {
        self.modify(|record| {
            if model.is_some() {
                record.model = model;
            }
            if usage.is_some() {
                record.usage = usage;
            }
        })
    }

    /// Removes the record without parsing it, so a corrupt file can always be
    /// cleared. Returns whether a file was removed.
    pub fn destroy(&self) -> Result<bool> {
        let _lock = self.lock()?;
        match fs::remove_file(&self.file_path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(PresenceError::io("Failed to remove state file", err)),
        }
    }

    /// Removes the record only if it still belongs to daemon `pid`.
    pub fn destroy_if_owned(&self, pid: u32) -> Result<bool> {
        let _lock = self.lock()?;
        match self.read()? {
            Some(record) if record.daemon_pid.map_or(true, |owner| owner == pid) => {
                match fs::remove_file(&self.file_path) {
                    Ok(()) => Ok(true),
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
                    Err(err) => Err(PresenceError::io("Failed to remove state file", err)),
                }
            }
            _ => Ok(false),
        }
    }

    fn modify<F>(&self, change: F) -> Result<Option<SessionRecord>>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let _lock = self.lock()?;
        let Some(mut record) = self.read()? else {
            tracing::debug!("No session record; skipping update");
            return Ok(None);
        };
        change(&mut record);
        self.write(&record)?;
        Ok(Some(record))
    }

    fn write(&self, record: &SessionRecord) -> Result<()> {
        let content = serde_json::to_string_pretty(record).map_err(|err| PresenceError::Json {
            context: "Failed to serialize session record".to_string(),
            source: err,
        })?;

        let mut temp_file = NamedTempFile::new_in(&self.dir)
            .map_err(|err| PresenceError::io("Failed to create temp state file", err))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| PresenceError::io("Failed to write temp state file", err))?;
        temp_file
            .flush()
            .map_err(|err| PresenceError::io("Failed to flush temp state file", err))?;
        temp_file
            .persist(&self.file_path)
            .map_err(|err| PresenceError::io("Failed to commit state file", err.error))?;
        Ok(())
    }

    fn lock(&self) -> Result<StoreLock> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| PresenceError::io("Failed to create data directory", err))?;
        StoreLock::acquire(&self.dir.join(LOCK_FILE))
    }

    fn corrupt(&self, details: impl Into<String>) -> PresenceError {
        PresenceError::StateCorrupt {
            path: self.file_path.clone(),
            details: details.into(),
        }
    }
}

/// Exclusive advisory lock, released when dropped (closing the descriptor
/// drops the flock).
struct StoreLock {
    _file: std::fs::File,
}

impl StoreLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|err| PresenceError::io(format!("Failed to open {}", path.display()), err))?;

        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;
            // SAFETY: flock on a descriptor we own for the lifetime of `file`.
            #[allow(unsafe_code)]
            let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if ret != 0 {
                return Err(PresenceError::io(
                    "Failed to lock state file",
                    std::io::Error::last_os_error(),
                ));
            }
        }

        Ok(StoreLock { _file: file })
    }
}

//! Daemon liveness detection.
//!
//! Operating systems reuse PIDs. A record with PID 12345 might refer to a
//! daemon that exited long ago while an unrelated process now owns 12345.
//! We handle this:
//!
//! 1. **Records with `daemon_started`**: compare the live process's start time
//!    (±2 seconds). A mismatch means the PID was recycled.
//!
//! 2. **Records without it** (spawn raced the start-time lookup): require the
//!    process command line to mention the `cc-presence` binary.

use std::cell::RefCell;

use super::types::SessionRecord;

const BINARY_MARKER: &str = "cc-presence";
const START_TIME_TOLERANCE_SECS: u64 = 2;

// Per-PID refresh keeps each check O(1) instead of scanning every process.
thread_local! {
    static SYSTEM_CACHE: RefCell<Option<sysinfo::System>> = const { RefCell::new(None) };
}

pub fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    #[cfg(unix)]
    {
        // SAFETY: kill with signal 0 performs only the existence/permission check.
        #[allow(unsafe_code)]
        let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
        if result == 0 {
            return true;
        }
        // EPERM: the process exists but belongs to someone else.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Start time of a process (unix seconds), or `None` if it doesn't exist.
pub fn get_process_start_time(pid: u32) -> Option<u64> {
    use sysinfo::{Pid, ProcessRefreshKind, System};

    SYSTEM_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let sys = cache.get_or_insert_with(System::new);

        let sysinfo_pid = Pid::from(pid as usize);
        sys.refresh_process_specifics(sysinfo_pid, ProcessRefreshKind::new());
        sys.process(sysinfo_pid).map(|process| process.start_time())
    })
}

fn command_mentions_binary(pid: u32) -> bool {
    use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};

    SYSTEM_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let sys = cache.get_or_insert_with(System::new);

        let sysinfo_pid = Pid::from(pid as usize);
        sys.refresh_process_specifics(
            sysinfo_pid,
            ProcessRefreshKind::new().with_cmd(UpdateKind::Always),
        );

        let Some(process) = sys.process(sysinfo_pid) else {
            return false;
        };
        process.name().contains(BINARY_MARKER)
            || process.cmd().iter().any(|arg| arg.contains(BINARY_MARKER))
    })
}

/// True if `pid` is running and is the same process that was recorded.
pub fn is_pid_alive_verified(pid: u32, expected_start: Option<u64>) -> bool {
    if !is_pid_alive(pid) {
        return false;
    }

    let Some(expected_start) = expected_start else {
        return command_mentions_binary(pid);
    };

    match get_process_start_time(pid) {
        Some(actual_start) => actual_start.abs_diff(expected_start) <= START_TIME_TOLERANCE_SECS,
        None => false,
    }
}

/// The record's daemon PID, if that daemon is still running.
pub fn live_daemon_pid(record: &SessionRecord) -> Option<u32> {
    let pid = record.daemon_pid?;
    is_pid_alive_verified(pid, record.daemon_started).then_some(pid)
}

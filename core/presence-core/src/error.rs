//! Error types for presence-core operations.

use std::path::PathBuf;

/// All errors that can occur in presence-core operations.
///
/// Display-service failures are deliberately absent: the presence adapter
/// logs and swallows them, so they never reach a caller.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Could not determine a data directory for cc-presence")]
    DataDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Session State Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session state file corrupt: {path}: {details} (run `cc-presence stop` to reset)")]
    StateCorrupt { path: PathBuf, details: String },

    #[error("Presence daemon already running (PID {pid})")]
    AlreadyRunning { pid: u32 },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to spawn presence daemon: {source}")]
    SpawnFailed {
        #[source]
        source: std::io::Error,
    },
}

impl PresenceError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PresenceError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using PresenceError.
pub type Result<T> = std::result::Result<T, PresenceError>;

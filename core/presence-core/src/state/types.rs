//! Serialized session record.
//!
//! **Breaking changes are allowed**: a record with a different `version` is
//! treated as corrupt, and `cc-presence stop` resets it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{Activity, ActivityLabel};

pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: u32,
    pub project_name: String,
    pub activity: ActivityLabel,
    #[serde(default)]
    pub detail: String,
    pub session_start: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub daemon_pid: Option<u32>,
    /// Daemon process start time (unix seconds) for PID identity verification.
    #[serde(default)]
    pub daemon_started: Option<u64>,
    /// Fed by the status line hook; shown as the card's hover text.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl SessionRecord {
    pub fn new(project_name: &str, now: DateTime<Utc>) -> Self {
        let idle = Activity::idle();
        SessionRecord {
            version: RECORD_VERSION,
            project_name: project_name.to_string(),
            activity: idle.label,
            detail: idle.detail,
            session_start: now,
            last_activity: now,
            daemon_pid: None,
            daemon_started: None,
            model: None,
            usage: None,
        }
    }

    pub fn current_activity(&self) -> Activity {
        Activity {
            label: self.activity,
            detail: self.detail.clone(),
        }
    }

    /// Applies a tool event. `last_activity` never moves backwards, even if
    /// the caller's clock reads earlier than the stored value.
    pub fn apply(&mut self, activity: Activity, now: DateTime<Utc>) {
        self.activity = activity.label;
        self.detail = activity.detail;
        self.last_activity = self.last_activity.max(now);
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.session_start)
            .num_seconds()
            .max(0)
    }

    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.last_activity)
            .num_seconds()
            .max(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    #[serde(default)]
    pub cache_read: u64,
    #[serde(default)]
    pub cache_write: u64,
    #[serde(default)]
    pub cost_usd: f64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input.saturating_add(self.output)
    }
}

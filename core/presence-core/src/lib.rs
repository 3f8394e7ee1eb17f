//! Core library for cc-presence.
//!
//! Mirrors Claude Code activity onto Discord Rich Presence. The hook binary
//! (`cc-presence`) is a thin CLI over the pieces here:
//!
//! - [`activity`]: tool invocation → label + detail (pure)
//! - [`state`]: the on-disk Session State record and daemon liveness checks
//! - [`presence`]: best-effort Discord adapter with reconnect backoff
//! - [`watchdog`]: the daemon's idle timeout / sync loop
//! - [`config`]: data directory and `config.toml`

pub mod activity;
pub mod config;
pub mod error;
pub mod presence;
pub mod state;
pub mod watchdog;

pub use activity::{map_tool, Activity, ActivityLabel};
pub use config::Config;
pub use error::{PresenceError, Result};
pub use presence::{DiscordPresence, PresenceClient, PresenceUpdate};
pub use state::{SessionRecord, StateStore, TokenUsage};
pub use watchdog::{ExitReason, Watchdog};

//! Presence State Store.
//!
//! # Architecture: Shared Record
//!
//! There is no in-memory sharing between processes. Hook invocations and the
//! daemon communicate only through one JSON record:
//!
//! ```text
//! Claude Code → cc-presence start|notify|stop → state.json ← cc-presence daemon → Discord
//!   (host)          (short-lived writers)        (storage)      (poller)          (display)
//! ```
//!
//! Record existence means "a daemon is believed to be running". A record whose
//! daemon PID fails [`liveness`] checks is stale and is replaced by the next
//! `start`.
//!
//! # Module Structure
//!
//! - [`liveness`]: PID checks that survive PID reuse
//! - [`store`]: atomic reads/writes of `state.json`
//! - [`types`]: the serialized record

pub mod liveness;
mod store;
mod types;

pub use liveness::{get_process_start_time, is_pid_alive, live_daemon_pid};
pub use store::StateStore;
pub use types::{SessionRecord, TokenUsage, RECORD_VERSION};

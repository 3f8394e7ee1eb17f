//! Presence Client Adapter.
//!
//! Wraps the Discord IPC connection so that nothing the display service does
//! can hurt the daemon: every failure is logged, the connection is dropped,
//! and a reconnect is scheduled on a capped exponential backoff. Discord is
//! often started after the coding session, so we never give up permanently.

use chrono::{DateTime, Utc};
use discord_ipc::{Activity, Assets, IpcClient, Timestamps};
use std::cmp;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::activity::{truncate_chars, MAX_FIELD_CHARS};
use crate::config::Config;
use crate::state::SessionRecord;

const BACKOFF_INITIAL_SECS: u64 = 5;
const BACKOFF_MAX_SECS: u64 = 60;
const IPC_TIMEOUT_MS: u64 = 600;

/// What the card should show. Compared against the last sent value to skip
/// redundant sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub details: String,
    pub state: String,
    pub session_start: DateTime<Utc>,
    pub large_text: Option<String>,
}

impl PresenceUpdate {
    pub fn from_record(record: &SessionRecord, config: &Config) -> Self {
        let large_text = match (&config.large_text, &record.model) {
            (Some(text), Some(model)) => Some(format!("{} · {}", text, model)),
            (Some(text), None) => Some(text.clone()),
            (None, model) => model.clone(),
        };

        PresenceUpdate {
            details: record.current_activity().headline(),
            state: truncate_chars(&format!("on {}", record.project_name), MAX_FIELD_CHARS),
            session_start: record.session_start,
            large_text: large_text.map(|text| truncate_chars(&text, MAX_FIELD_CHARS)),
        }
    }

    fn to_activity(&self, large_image: Option<&str>) -> Activity {
        let assets = (large_image.is_some() || self.large_text.is_some()).then(|| Assets {
            large_image: large_image.map(str::to_string),
            large_text: self.large_text.clone(),
            ..Default::default()
        });

        Activity {
            state: Some(self.state.clone()),
            details: Some(self.details.clone()),
            timestamps: Some(Timestamps {
                start: Some(self.session_start.timestamp()),
                end: None,
            }),
            assets,
        }
    }
}

/// Capability the daemon needs from a display service. Implementations must
/// not panic or block for long; failures are absorbed internally.
pub trait PresenceClient {
    /// Returns true if a connection is available after the call.
    fn connect(&mut self) -> bool;
    fn set_activity(&mut self, update: &PresenceUpdate);
    fn clear_activity(&mut self);
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
}

/// Reconnect schedule: 5s, 10s, 20s, 40s, then every 60s.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    initial: Duration,
    max: Duration,
    next_attempt: Option<Instant>,
    failures: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(
            Duration::from_secs(BACKOFF_INITIAL_SECS),
            Duration::from_secs(BACKOFF_MAX_SECS),
        )
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Backoff {
            delay: initial,
            initial,
            max,
            next_attempt: None,
            failures: 0,
        }
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.next_attempt.map_or(true, |at| now >= at)
    }

    pub fn failed(&mut self, now: Instant) -> Duration {
        let wait = self.delay;
        self.next_attempt = Some(now + wait);
        self.failures = self.failures.saturating_add(1);
        self.delay = cmp::min(self.delay.saturating_mul(2), self.max);
        wait
    }

    pub fn reset(&mut self) {
        self.delay = self.initial;
        self.next_attempt = None;
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SendDecision {
    Skip,
    Defer,
    Send,
}

pub struct DiscordPresence {
    client_id: String,
    candidates: Vec<PathBuf>,
    pid: u32,
    large_image: Option<String>,
    min_update_interval: Duration,
    conn: Option<IpcClient>,
    backoff: Backoff,
    last_sent: Option<PresenceUpdate>,
    last_sent_at: Option<Instant>,
}

impl DiscordPresence {
    pub fn new(config: &Config) -> Self {
        DiscordPresence::with_candidates(config, discord_ipc::default_socket_candidates())
    }

    pub fn with_candidates(config: &Config, candidates: Vec<PathBuf>) -> Self {
        DiscordPresence {
            client_id: config.client_id.clone(),
            candidates,
            pid: std::process::id(),
            large_image: config.large_image.clone(),
            min_update_interval: config.min_update_interval(),
            conn: None,
            backoff: Backoff::default(),
            last_sent: None,
            last_sent_at: None,
        }
    }

    fn send_decision(&self, update: &PresenceUpdate, now: Instant) -> SendDecision {
        if self.last_sent.as_ref() == Some(update) {
            return SendDecision::Skip;
        }
        match self.last_sent_at {
            Some(at) if now.duration_since(at) < self.min_update_interval => SendDecision::Defer,
            _ => SendDecision::Send,
        }
    }

    fn drop_connection(&mut self, reason: &discord_ipc::IpcError) {
        warn!(error = %reason, "Discord connection lost; will reconnect");
        self.conn = None;
        self.last_sent = None;
        let wait = self.backoff.failed(Instant::now());
        debug!(retry_in_secs = wait.as_secs(), "Discord reconnect scheduled");
    }
}

impl PresenceClient for DiscordPresence {
    fn connect(&mut self) -> bool {
        if self.conn.is_some() {
            return true;
        }
        let now = Instant::now();
        if !self.backoff.ready(now) {
            return false;
        }

        match IpcClient::connect(
            &self.client_id,
            &self.candidates,
            Duration::from_millis(IPC_TIMEOUT_MS),
        ) {
            Ok(client) => {
                info!(socket = %client.path().display(), "Connected to Discord");
                self.conn = Some(client);
                self.backoff.reset();
                self.last_sent = None;
                self.last_sent_at = None;
                true
            }
            Err(err) => {
                let wait = self.backoff.failed(now);
                // First failure is worth a warning; repeats are expected while Discord is closed.
                if self.backoff.failures() == 1 {
                    warn!(error = %err, retry_in_secs = wait.as_secs(), "Failed to connect to Discord");
                } else {
                    debug!(error = %err, retry_in_secs = wait.as_secs(), "Discord still unavailable");
                }
                false
            }
        }
    }

    fn set_activity(&mut self, update: &PresenceUpdate) {
        let now = Instant::now();
        match self.send_decision(update, now) {
            SendDecision::Skip => return,
            SendDecision::Defer => {
                debug!("Presence update deferred by rate limit");
                return;
            }
            SendDecision::Send => {}
        }
        if !self.connect() {
            return;
        }

        let activity = update.to_activity(self.large_image.as_deref());
        let result = match self.conn.as_mut() {
            Some(conn) => conn.set_activity(self.pid, Some(&activity)),
            None => return,
        };

        match result {
            Ok(()) => {
                info!(details = %update.details, state = %update.state, "Presence updated");
                self.last_sent = Some(update.clone());
                self.last_sent_at = Some(now);
            }
            Err(err) => self.drop_connection(&err),
        }
    }

    fn clear_activity(&mut self) {
        let result = match self.conn.as_mut() {
            Some(conn) => conn.set_activity(self.pid, None),
            // Without a connection there is no card of ours to clear.
            None => return,
        };

        match result {
            Ok(()) => {
                info!("Presence cleared");
                self.last_sent = None;
                self.last_sent_at = Some(Instant::now());
            }
            Err(err) => self.drop_connection(&err),
        }
    }

    fn disconnect(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
            debug!("Disconnected from Discord");
        }
        self.last_sent = None;
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::map_tool;
    use serde_json::json;

    fn sample_update(details: &str) -> PresenceUpdate {
        PresenceUpdate {
            details: details.to_string(),
            state: "on demo".to_string(),
            session_start: Utc::now(),
            large_text: None,
        }
    }

    #[test]
    fn update_from_record_formats_card() {
        let now = Utc::now();
        let mut record = SessionRecord::new("my-project", now);
        record.apply(map_tool("Edit", &json!({"file_path": "src/main.go"})), now);
        record.model = Some("Opus".to_string());

        let update = PresenceUpdate::from_record(&record, &Config::default());
        assert_eq!(update.details, "Editing main.go");
        assert_eq!(update.state, "on my-project");
        assert_eq!(update.session_start, now);
        assert_eq!(update.large_text.as_deref(), Some("Claude Code · Opus"));

        let activity = update.to_activity(Some("claude"));
        assert_eq!(activity.timestamps.unwrap().start, Some(now.timestamp()));
        assert_eq!(activity.assets.unwrap().large_image.as_deref(), Some("claude"));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = Backoff::default();
        let now = Instant::now();
        let waits: Vec<u64> = (0..6).map(|_| backoff.failed(now).as_secs()).collect();

        assert_eq!(waits, vec![5, 10, 20, 40, 60, 60]);
        assert_eq!(backoff.failures(), 6);
        assert!(!backoff.ready(now));
        assert!(backoff.ready(now + Duration::from_secs(60)));

        backoff.reset();
        assert!(backoff.ready(now));
        assert_eq!(backoff.failed(now), Duration::from_secs(5));
    }

    #[test]
    fn connect_failure_schedules_retry() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = discord_ipc::socket_candidates_in(&[dir.path().to_path_buf()]);
        let mut presence = DiscordPresence::with_candidates(&Config::default(), candidates);

        assert!(!presence.connect());
        assert!(!presence.is_connected());
        assert_eq!(presence.backoff.failures(), 1);

        // Within the backoff window no new attempt is made.
        assert!(!presence.connect());
        assert_eq!(presence.backoff.failures(), 1);
    }

    #[test]
    fn operations_without_connection_never_panic() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = discord_ipc::socket_candidates_in(&[dir.path().to_path_buf()]);
        let mut presence = DiscordPresence::with_candidates(&Config::default(), candidates);

        presence.set_activity(&sample_update("Reading"));
        presence.clear_activity();
        presence.disconnect();
        assert!(!presence.is_connected());
    }

    #[test]
    fn sends_card_to_discord_socket_and_clears_it() {
        use discord_ipc::{read_frame, write_frame, Opcode};
        use std::os::unix::net::UnixListener;
        use std::sync::mpsc;

        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("discord-ipc-0");
        let listener = UnixListener::bind(&socket).unwrap();
        let (tx, rx) = mpsc::channel();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_frame(&mut stream).unwrap();
            write_frame(&mut stream, Opcode::Frame, &json!({"evt": "READY"})).unwrap();
            while let Ok((Opcode::Frame, payload)) = read_frame(&mut stream) {
                let nonce = payload["nonce"].clone();
                tx.send(payload["args"]["activity"].clone()).unwrap();
                write_frame(&mut stream, Opcode::Frame, &json!({"nonce": nonce})).unwrap();
            }
        });

        let mut presence = DiscordPresence::with_candidates(&Config::default(), vec![socket]);
        let update = sample_update("Editing lib.rs");
        presence.set_activity(&update);
        assert!(presence.is_connected());
        // Same card again is not resent.
        presence.set_activity(&update);
        presence.clear_activity();
        presence.disconnect();
        server.join().unwrap();

        let sent: Vec<_> = rx.iter().collect();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["details"], "Editing lib.rs");
        assert_eq!(sent[0]["state"], "on demo");
        assert_eq!(sent[0]["assets"]["large_image"], "claude");
        assert!(sent[1].is_null());
    }

    #[test]
    fn identical_update_is_skipped_and_rapid_change_deferred() {
        let mut presence = DiscordPresence::with_candidates(&Config::default(), Vec::new());
        let now = Instant::now();
        let first = sample_update("Reading a.rs");

        assert_eq!(presence.send_decision(&first, now), SendDecision::Send);

        presence.last_sent = Some(first.clone());
        presence.last_sent_at = Some(now);
        assert_eq!(presence.send_decision(&first, now), SendDecision::Skip);

        let second = sample_update("Editing a.rs");
        assert_eq!(presence.send_decision(&second, now), SendDecision::Defer);
        assert_eq!(
            presence.send_decision(&second, now + Duration::from_secs(5)),
            SendDecision::Send
        );
    }
}

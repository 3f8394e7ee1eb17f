//! Blocking IPC client.
//!
//! Every call is bounded by the socket read/write timeouts so a hung Discord
//! process cannot stall the caller for longer than one timeout.

use rand::RngCore;
use serde_json::Value;
use std::env;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    close_reason, handshake_payload, read_frame, set_activity_payload, write_frame, Activity,
    IpcError, Opcode, Result,
};

const SOCKET_PREFIX: &str = "discord-ipc-";
const SOCKET_SLOTS: u32 = 10;
const RUNTIME_DIR_ENVS: [&str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];
// Sandboxed installs put the socket one level deeper.
const SANDBOX_SUBDIRS: [&str; 2] = ["app/com.discordapp.Discord", "snap.discord"];
const MAX_SKIPPED_FRAMES: usize = 8;

pub struct IpcClient {
    stream: UnixStream,
    path: PathBuf,
}

impl IpcClient {
    /// Connects to the first candidate socket that accepts a handshake.
    pub fn connect(client_id: &str, candidates: &[PathBuf], timeout: Duration) -> Result<Self> {
        let mut last_err = IpcError::SocketNotFound;

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::connect_path(path, client_id, timeout) {
                Ok(client) => return Ok(client),
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "Discord IPC candidate rejected");
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    pub fn connect_path(path: &Path, client_id: &str, timeout: Duration) -> Result<Self> {
        let stream = UnixStream::connect(path)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut client = IpcClient {
            stream,
            path: path.to_path_buf(),
        };
        client.handshake(client_id)?;
        Ok(client)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn handshake(&mut self, client_id: &str) -> Result<()> {
        write_frame(&mut self.stream, Opcode::Handshake, &handshake_payload(client_id))?;

        let (opcode, payload) = read_frame(&mut self.stream)?;
        match opcode {
            Opcode::Frame if payload.get("evt").and_then(Value::as_str) == Some("READY") => Ok(()),
            Opcode::Close => {
                let (code, message) = close_reason(&payload);
                Err(IpcError::Closed { code, message })
            }
            other => Err(IpcError::Protocol(format!(
                "expected READY after handshake, got {:?}",
                other
            ))),
        }
    }

    /// Sets (or with `None`, clears) the activity shown for `pid`.
    pub fn set_activity(&mut self, pid: u32, activity: Option<&Activity>) -> Result<()> {
        let nonce = make_nonce(pid);
        write_frame(
            &mut self.stream,
            Opcode::Frame,
            &set_activity_payload(pid, activity, &nonce),
        )?;
        let response = self.await_response(&nonce)?;

        if response.get("evt").and_then(Value::as_str) == Some("ERROR") {
            let message = response
                .pointer("/data/message")
                .and_then(Value::as_str)
                .unwrap_or("SET_ACTIVITY rejected")
                .to_string();
            return Err(IpcError::Protocol(message));
        }
        Ok(())
    }

    /// Best-effort close handshake. Errors are irrelevant once we are leaving.
    pub fn close(mut self) {
        let _ = write_frame(&mut self.stream, Opcode::Close, &serde_json::json!({}));
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    fn await_response(&mut self, nonce: &str) -> Result<Value> {
        for _ in 0..MAX_SKIPPED_FRAMES {
            let (opcode, payload) = read_frame(&mut self.stream)?;
            match opcode {
                Opcode::Frame => {
                    if payload.get("nonce").and_then(Value::as_str) == Some(nonce) {
                        return Ok(payload);
                    }
                    tracing::debug!(evt = ?payload.get("evt"), "Skipping unrelated IPC frame");
                }
                Opcode::Ping => write_frame(&mut self.stream, Opcode::Pong, &payload)?,
                Opcode::Close => {
                    let (code, message) = close_reason(&payload);
                    return Err(IpcError::Closed { code, message });
                }
                Opcode::Handshake | Opcode::Pong => {}
            }
        }
        Err(IpcError::Protocol(format!(
            "no response for nonce {} after {} frames",
            nonce, MAX_SKIPPED_FRAMES
        )))
    }
}

/// Candidate socket paths derived from the usual runtime-dir variables,
/// falling back to `/tmp`.
pub fn default_socket_candidates() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = RUNTIME_DIR_ENVS
        .iter()
        .filter_map(|key| env::var_os(key))
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .collect();
    dirs.push(PathBuf::from("/tmp"));
    dirs.dedup();
    socket_candidates_in(&dirs)
}

pub fn socket_candidates_in(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for dir in dirs {
        let mut roots = vec![dir.clone()];
        roots.extend(SANDBOX_SUBDIRS.iter().map(|sub| dir.join(sub)));
        for root in roots {
            for slot in 0..SOCKET_SLOTS {
                candidates.push(root.join(format!("{}{}", SOCKET_PREFIX, slot)));
            }
        }
    }
    candidates
}

fn make_nonce(pid: u32) -> String {
    let mut random = rand::thread_rng();
    format!("{}-{:x}", pid, random.next_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::sync::mpsc;
    use std::thread;

    const TIMEOUT: Duration = Duration::from_millis(600);

    /// Minimal Discord stand-in: answers the handshake, then replies to each
    /// command by echoing its nonce. Received command payloads are forwarded
    /// on `seen`.
    fn spawn_fake_discord(
        listener: UnixListener,
        reject_handshake: bool,
        seen: mpsc::Sender<Value>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let (opcode, _) = read_frame(&mut stream).expect("handshake frame");
            assert_eq!(opcode, Opcode::Handshake);

            if reject_handshake {
                write_frame(
                    &mut stream,
                    Opcode::Close,
                    &serde_json::json!({"code": 4000, "message": "Invalid Client ID"}),
                )
                .expect("close frame");
                return;
            }

            write_frame(
                &mut stream,
                Opcode::Frame,
                &serde_json::json!({"cmd": "DISPATCH", "evt": "READY", "data": {"v": 1}}),
            )
            .expect("ready frame");

            while let Ok((opcode, payload)) = read_frame(&mut stream) {
                if opcode != Opcode::Frame {
                    break;
                }
                let nonce = payload["nonce"].clone();
                let _ = seen.send(payload);
                write_frame(
                    &mut stream,
                    Opcode::Frame,
                    &serde_json::json!({"cmd": "SET_ACTIVITY", "evt": null, "nonce": nonce}),
                )
                .expect("reply frame");
            }
        })
    }

    #[test]
    fn connects_and_sets_activity() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("discord-ipc-0");
        let listener = UnixListener::bind(&socket).unwrap();
        let (tx, rx) = mpsc::channel();
        let server = spawn_fake_discord(listener, false, tx);

        let mut client = IpcClient::connect("app-id", &[socket.clone()], TIMEOUT).unwrap();
        assert_eq!(client.path(), socket.as_path());

        let activity = Activity {
            details: Some("Editing main.rs".to_string()),
            state: Some("on demo".to_string()),
            ..Default::default()
        };
        client.set_activity(7, Some(&activity)).unwrap();
        client.set_activity(7, None).unwrap();
        client.close();
        server.join().unwrap();

        let first = rx.recv().unwrap();
        assert_eq!(first["args"]["activity"]["details"], "Editing main.rs");
        let second = rx.recv().unwrap();
        assert!(second["args"]["activity"].is_null());
    }

    #[test]
    fn handshake_rejection_surfaces_close_reason() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("discord-ipc-0");
        let listener = UnixListener::bind(&socket).unwrap();
        let (tx, _rx) = mpsc::channel();
        let server = spawn_fake_discord(listener, true, tx);

        let err = IpcClient::connect_path(&socket, "bad-id", TIMEOUT)
            .err()
            .expect("handshake should fail");
        server.join().unwrap();

        match err {
            IpcError::Closed { code, message } => {
                assert_eq!(code, 4000);
                assert_eq!(message, "Invalid Client ID");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn connect_without_sockets_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = socket_candidates_in(&[dir.path().to_path_buf()]);

        let err = IpcClient::connect("app-id", &candidates, TIMEOUT)
            .err()
            .expect("no socket should exist");
        assert!(matches!(err, IpcError::SocketNotFound));
    }

    #[test]
    fn candidates_cover_all_slots_and_sandboxes() {
        let candidates = socket_candidates_in(&[PathBuf::from("/run/user/1000")]);

        assert_eq!(candidates.len(), 30);
        assert_eq!(candidates[0], PathBuf::from("/run/user/1000/discord-ipc-0"));
        assert!(candidates.contains(&PathBuf::from(
            "/run/user/1000/app/com.discordapp.Discord/discord-ipc-3"
        )));
        assert!(candidates.contains(&PathBuf::from("/run/user/1000/snap.discord/discord-ipc-9")));
    }
}

use presence_core::state::is_pid_alive;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Isolated data dir + empty runtime dir (no Discord socket). Stops any daemon
/// it started when dropped.
struct TestEnv {
    data: TempDir,
    runtime: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        TestEnv {
            data: TempDir::new().expect("Failed to create data dir"),
            runtime: TempDir::new().expect("Failed to create runtime dir"),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_cc-presence"));
        command
            .args(args)
            .env("CC_PRESENCE_DATA_DIR", self.data.path())
            .env("XDG_RUNTIME_DIR", self.runtime.path())
            .env("TMPDIR", self.runtime.path())
            .env_remove("TMP")
            .env_remove("TEMP")
            .env_remove("CLAUDE_PROJECT_DIR")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .expect("Failed to run cc-presence")
    }

    fn run_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .spawn()
            .expect("Failed to spawn cc-presence");
        child
            .stdin
            .take()
            .expect("stdin")
            .write_all(stdin.as_bytes())
            .expect("Failed to write stdin");
        child.wait_with_output().expect("Failed to wait for cc-presence")
    }

    fn status(&self) -> Value {
        let output = self.run(&["status", "--json"]);
        assert!(output.status.success(), "status failed: {:?}", output);
        serde_json::from_slice(&output.stdout).expect("status JSON")
    }

    fn state_path(&self) -> PathBuf {
        self.data.path().join("state.json")
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = self.run(&["stop"]);
    }
}

fn exited_pid() -> u32 {
    let mut child = Command::new("true").spawn().expect("spawn true");
    let pid = child.id();
    child.wait().expect("wait true");
    pid
}

fn wait_for_missing(path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !path.exists() {
            return true;
        }
        sleep(Duration::from_millis(25));
    }
    !path.exists()
}

#[test]
fn start_notify_status_stop_scenario() {
    let env = TestEnv::new();

    let output = env.run(&["start", "my-project"]);
    assert!(output.status.success(), "start failed: {:?}", output);

    let status = env.status();
    assert_eq!(status["running"], true);
    assert_eq!(status["project"], "my-project");
    let pid = status["pid"].as_u64().expect("pid") as u32;
    assert!(is_pid_alive(pid));

    let output = env.run(&["notify", "Edit", r#"{"file":"main.go"}"#]);
    assert!(output.status.success());

    let status = env.status();
    assert_eq!(status["activity"], "Editing");
    assert!(status["detail"].as_str().unwrap().contains("main.go"));
    assert_eq!(status["project"], "my-project");

    let output = env.run(&["stop"]);
    assert!(output.status.success());
    assert!(!env.state_path().exists());

    let status = env.status();
    assert_eq!(status["running"], false);

    let human = env.run(&["status"]);
    assert!(String::from_utf8_lossy(&human.stdout).contains("not running"));
}

#[test]
fn repeated_start_keeps_single_daemon() {
    let env = TestEnv::new();

    assert!(env.run(&["start", "proj"]).status.success());
    let first = env.status();

    assert!(env.run(&["start", "another"]).status.success());
    let second = env.status();

    assert_eq!(first["pid"], second["pid"]);
    assert_eq!(second["project"], "proj");
    let entries = std::fs::read_dir(env.data.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("state.json"))
        .count();
    assert_eq!(entries, 1);
}

#[test]
fn stale_record_is_replaced_on_start() {
    let env = TestEnv::new();
    let stale_pid = exited_pid();
    std::fs::write(
        env.state_path(),
        serde_json::json!({
            "version": 1,
            "project_name": "old",
            "activity": "editing",
            "detail": "old.rs",
            "session_start": "2026-01-01T00:00:00Z",
            "last_activity": "2026-01-01T00:00:00Z",
            "daemon_pid": stale_pid
        })
        .to_string(),
    )
    .unwrap();

    assert_eq!(env.status()["running"], false);

    let output = env.run(&["start", "proj"]);
    assert!(output.status.success(), "start failed: {:?}", output);

    let status = env.status();
    assert_eq!(status["running"], true);
    assert_eq!(status["project"], "proj");
    assert_eq!(status["activity"], "Idle");
    assert_ne!(status["pid"].as_u64(), Some(stale_pid as u64));
}

#[test]
fn stop_without_daemon_succeeds_and_leaves_no_record() {
    let env = TestEnv::new();

    let output = env.run(&["stop"]);
    assert!(output.status.success());
    assert!(!env.state_path().exists());
    assert!(env.run(&["stop"]).status.success());
}

#[test]
fn notify_never_fails_the_host() {
    let env = TestEnv::new();

    assert!(env.run(&["notify", "Edit", "{}"]).status.success());
    assert!(env.run_with_stdin(&["notify"], "garbage").status.success());
    assert!(!env.state_path().exists());

    std::fs::write(env.state_path(), "{corrupt").unwrap();
    assert!(env.run(&["notify", "Read"]).status.success());
}

#[test]
fn notify_reads_hook_payload_from_stdin() {
    let env = TestEnv::new();
    assert!(env.run(&["start", "proj"]).status.success());

    let payload = r#"{"hook_event_name":"PreToolUse","tool_name":"Read","tool_input":{"file_path":"/repo/src/lib.rs"}}"#;
    assert!(env.run_with_stdin(&["notify"], payload).status.success());

    let status = env.status();
    assert_eq!(status["activity"], "Reading");
    assert_eq!(status["detail"], "lib.rs");
}

#[test]
fn start_reads_project_from_hook_cwd() {
    let env = TestEnv::new();
    let payload = r#"{"hook_event_name":"SessionStart","cwd":"/home/dev/widgets"}"#;

    assert!(env.run_with_stdin(&["start"], payload).status.success());
    assert_eq!(env.status()["project"], "widgets");
}

#[test]
fn corrupt_record_fails_status_and_start() {
    let env = TestEnv::new();
    std::fs::write(env.state_path(), "not json").unwrap();

    let status = env.run(&["status"]);
    assert_eq!(status.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&status.stderr).contains("corrupt"));

    let start = env.run(&["start", "proj"]);
    assert_eq!(start.status.code(), Some(1));

    // stop is the documented way out.
    assert!(env.run(&["stop"]).status.success());
    assert!(env.run(&["start", "proj"]).status.success());
}

#[test]
fn session_can_restart_after_stop() {
    let env = TestEnv::new();
    assert!(env.run(&["start", "first"]).status.success());
    assert_eq!(env.status()["running"], true);

    assert!(env.run(&["stop"]).status.success());
    assert!(wait_for_missing(&env.state_path(), Duration::from_secs(2)));
    assert!(env.run(&["stop"]).status.success());

    assert!(env.run(&["start", "second"]).status.success());
    let status = env.status();
    assert_eq!(status["running"], true);
    assert_eq!(status["project"], "second");
    assert_eq!(status["activity"], "Idle");
}

#[test]
fn statusline_prints_and_never_fails() {
    let env = TestEnv::new();
    let payload = r#"{"model":{"display_name":"Opus"},"cost":{"total_cost_usd":1.5},
        "context_window":{"total_input_tokens":1000,"total_output_tokens":500}}"#;

    let output = env.run_with_stdin(&["statusline"], payload);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "[Opus] 1.5k | $1.50");

    let output = env.run_with_stdin(&["statusline"], "{{");
    assert!(output.status.success());
}

//! Hook payloads delivered by Claude Code on stdin.

use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";
const FALLBACK_PROJECT: &str = "Claude Code";

/// Common fields of SessionStart / PreToolUse / Stop payloads. Everything is
/// optional because each event carries a different subset.
#[derive(Debug, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
}

/// Reads stdin fully, unless it is a terminal. Returns an empty string when
/// nothing was piped in.
pub fn read_stdin() -> String {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return String::new();
    }
    let mut input = String::new();
    if let Err(err) = stdin.lock().read_to_string(&mut input) {
        tracing::debug!(error = %err, "Failed to read stdin");
    }
    input
}

pub fn parse_hook_input(raw: &str) -> Option<HookInput> {
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(input) => Some(input),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to parse hook input");
            None
        }
    }
}

pub fn read_hook_input() -> Option<HookInput> {
    parse_hook_input(&read_stdin())
}

/// Tool arguments given on the command line. Anything that isn't JSON is
/// treated as a bare command string.
pub fn parse_tool_args(raw: Option<&str>) -> Value {
    match raw.map(str::trim) {
        None | Some("") => Value::Null,
        Some(text) => serde_json::from_str(text)
            .unwrap_or_else(|_| serde_json::json!({ "command": text })),
    }
}

/// Picks the project name: explicit argument, then hook `cwd`, then
/// `$CLAUDE_PROJECT_DIR`, then the current directory.
pub fn resolve_project_name(explicit: Option<String>, hook: Option<&HookInput>) -> String {
    if let Some(name) = explicit.map(|name| name.trim().to_string()) {
        if !name.is_empty() {
            return name;
        }
    }

    let candidates = [
        hook.and_then(|input| input.cwd.clone()),
        env::var(PROJECT_DIR_ENV).ok(),
        env::current_dir()
            .ok()
            .map(|dir| dir.to_string_lossy().into_owned()),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|path| dir_name(&path))
        .unwrap_or_else(|| FALLBACK_PROJECT.to_string())
}

fn dir_name(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_end_matches('/');
    Path::new(trimmed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pre_tool_use_payload() {
        let input = parse_hook_input(
            r#"{"hook_event_name":"PreToolUse","session_id":"s1","cwd":"/repo",
               "tool_name":"Edit","tool_input":{"file_path":"/repo/main.go"},"extra":true}"#,
        )
        .unwrap();
        assert_eq!(input.cwd.as_deref(), Some("/repo"));
        assert_eq!(input.tool_name.as_deref(), Some("Edit"));
        assert_eq!(input.tool_input.unwrap()["file_path"], "/repo/main.go");
    }

    #[test]
    fn empty_or_invalid_payload_is_none() {
        assert!(parse_hook_input("  \n").is_none());
        assert!(parse_hook_input("not json").is_none());
    }

    #[test]
    fn tool_args_fall_back_to_command_string() {
        assert_eq!(parse_tool_args(None), Value::Null);
        assert_eq!(parse_tool_args(Some(r#"{"file":"a.rs"}"#))["file"], "a.rs");
        assert_eq!(parse_tool_args(Some("ls -la"))["command"], "ls -la");
    }

    #[test]
    fn explicit_project_name_wins() {
        let hook = HookInput {
            cwd: Some("/home/me/other".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_project_name(Some("my-project".to_string()), Some(&hook)),
            "my-project"
        );
    }

    #[test]
    fn project_name_from_hook_cwd() {
        let hook = HookInput {
            cwd: Some("/home/me/widgets/".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_project_name(None, Some(&hook)), "widgets");
        assert_eq!(
            resolve_project_name(Some("   ".to_string()), Some(&hook)),
            "widgets"
        );
    }

    #[test]
    fn root_dir_has_no_name() {
        assert_eq!(dir_name("/"), None);
        assert_eq!(dir_name("/srv/app"), Some("app".to_string()));
    }
}

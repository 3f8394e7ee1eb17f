//! Tool invocation → displayed activity.
//!
//! Pure functions only. Every tool name maps to something: unknown tools
//! (including MCP tools) fall back to [`ActivityLabel::Working`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Upper bound for the detail text stored in the record.
pub const MAX_DETAIL_CHARS: usize = 64;
/// Discord rejects presence strings longer than this.
pub const MAX_FIELD_CHARS: usize = 128;
const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLabel {
    Idle,
    Editing,
    Writing,
    Reading,
    Running,
    Searching,
    Delegating,
    Fetching,
    Researching,
    Planning,
    Asking,
    Working,
}

impl ActivityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Idle => "Idle",
            ActivityLabel::Editing => "Editing",
            ActivityLabel::Writing => "Writing",
            ActivityLabel::Reading => "Reading",
            ActivityLabel::Running => "Running",
            ActivityLabel::Searching => "Searching",
            ActivityLabel::Delegating => "Delegating",
            ActivityLabel::Fetching => "Fetching",
            ActivityLabel::Researching => "Researching",
            ActivityLabel::Planning => "Planning",
            ActivityLabel::Asking => "Asking",
            ActivityLabel::Working => "Working",
        }
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub label: ActivityLabel,
    pub detail: String,
}

impl Activity {
    pub fn idle() -> Self {
        Activity {
            label: ActivityLabel::Idle,
            detail: String::new(),
        }
    }

    /// The line shown on the card, e.g. `Editing main.rs`.
    pub fn headline(&self) -> String {
        if self.detail.is_empty() {
            self.label.as_str().to_string()
        } else {
            truncate_chars(&format!("{} {}", self.label, self.detail), MAX_FIELD_CHARS)
        }
    }
}

pub fn map_tool(tool_name: &str, args: &Value) -> Activity {
    let (label, detail) = match tool_name {
        "Edit" | "MultiEdit" | "NotebookEdit" => (ActivityLabel::Editing, file_name(args)),
        "Write" => (ActivityLabel::Writing, file_name(args)),
        "Read" => (ActivityLabel::Reading, file_name(args)),
        "Bash" => (ActivityLabel::Running, command_summary(args)),
        "Glob" | "Grep" => (ActivityLabel::Searching, string_arg(args, &["pattern"])),
        "Task" => (ActivityLabel::Delegating, string_arg(args, &["description"])),
        "WebFetch" => (ActivityLabel::Fetching, url_host(args)),
        "WebSearch" => (ActivityLabel::Researching, string_arg(args, &["query"])),
        "TodoWrite" | "ExitPlanMode" => (ActivityLabel::Planning, None),
        "AskUserQuestion" => (ActivityLabel::Asking, None),
        _ => (ActivityLabel::Working, None),
    };

    Activity {
        label,
        detail: detail
            .map(|text| truncate_chars(&collapse_whitespace(&text), MAX_DETAIL_CHARS))
            .unwrap_or_default(),
    }
}

fn string_arg(args: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| args.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn file_name(args: &Value) -> Option<String> {
    let path = string_arg(args, &["file_path", "file", "path", "notebook_path"])?;
    let name = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Some(name.unwrap_or(path))
}

fn command_summary(args: &Value) -> Option<String> {
    string_arg(args, &["description"]).or_else(|| {
        string_arg(args, &["command"])
            .and_then(|command| command.lines().next().map(|line| line.trim().to_string()))
    })
}

fn url_host(args: &Value) -> Option<String> {
    let url = string_arg(args, &["url"])?;
    let without_scheme = url.split_once("://").map_or(url.as_str(), |(_, rest)| rest);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    Some(host.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut truncated: String = text.chars().take(max - 1).collect();
    truncated.push(ELLIPSIS);
    truncated
}

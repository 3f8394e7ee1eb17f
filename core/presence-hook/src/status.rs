//! `cc-presence status`: read-only report.

use chrono::{DateTime, Utc};
use presence_core::config;
use presence_core::state::live_daemon_pid;
use presence_core::{PresenceError, StateStore};
use serde::Serialize;

use crate::statusline::format_tokens;

#[derive(Debug, Serialize, PartialEq)]
pub struct StatusReport {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl StatusReport {
    fn not_running() -> Self {
        StatusReport {
            running: false,
            pid: None,
            project: None,
            activity: None,
            detail: None,
            elapsed_secs: None,
            idle_secs: None,
            model: None,
            total_tokens: None,
            cost_usd: None,
        }
    }
}

pub fn run(json: bool) -> Result<(), PresenceError> {
    let store = StateStore::new(&config::data_dir()?);
    let report = collect(&store, Utc::now())?;

    if json {
        let rendered = serde_json::to_string_pretty(&report).map_err(|source| {
            PresenceError::Json {
                context: "Failed to render status".to_string(),
                source,
            }
        })?;
        println!("{}", rendered);
    } else {
        print!("{}", render_human(&report));
    }
    Ok(())
}

/// Never mutates the store. A record whose daemon is gone reports as not
/// running.
pub fn collect(store: &StateStore, now: DateTime<Utc>) -> Result<StatusReport, PresenceError> {
    let Some(record) = store.read()? else {
        return Ok(StatusReport::not_running());
    };
    let Some(pid) = live_daemon_pid(&record) else {
        return Ok(StatusReport::not_running());
    };

    Ok(StatusReport {
        running: true,
        pid: Some(pid),
        project: Some(record.project_name.clone()),
        activity: Some(record.activity.to_string()),
        detail: Some(record.detail.clone()),
        elapsed_secs: Some(record.elapsed_secs(now)),
        idle_secs: Some(record.idle_secs(now)),
        model: record.model.clone(),
        total_tokens: record.usage.as_ref().map(|usage| usage.total()),
        cost_usd: record.usage.as_ref().map(|usage| usage.cost_usd),
    })
}

pub fn render_human(report: &StatusReport) -> String {
    let Some(pid) = report.pid.filter(|_| report.running) else {
        return "Daemon not running\nNo active session\n".to_string();
    };

    let mut out = format!("Daemon running (PID {})\n", pid);
    if let Some(project) = &report.project {
        out.push_str(&format!("Project: {}\n", project));
    }
    if let Some(activity) = &report.activity {
        match report.detail.as_deref().filter(|detail| !detail.is_empty()) {
            Some(detail) => out.push_str(&format!("Activity: {} {}\n", activity, detail)),
            None => out.push_str(&format!("Activity: {}\n", activity)),
        }
    }
    if let Some(elapsed) = report.elapsed_secs {
        out.push_str(&format!("Elapsed: {}\n", format_duration(elapsed)));
    }
    if let Some(idle) = report.idle_secs {
        out.push_str(&format!("Last update: {}s ago\n", idle));
    }
    if let Some(model) = &report.model {
        out.push_str(&format!("Model: {}\n", model));
    }
    if let (Some(tokens), Some(cost)) = (report.total_tokens, report.cost_usd) {
        out.push_str(&format!("Tokens: {} (${:.2})\n", format_tokens(tokens), cost));
    }
    out
}

fn format_duration(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

//! `cc-presence statusline`: Claude Code status line command.
//!
//! Called every few hundred milliseconds with model and token data on stdin.
//! Merges that data into the live record (if any) and prints the status line
//! text, e.g. `[Opus] 12.5k | $0.12`.

use presence_core::config;
use presence_core::{PresenceError, StateStore, TokenUsage};
use serde::Deserialize;

use crate::input;

#[derive(Debug, Default, Deserialize)]
pub struct StatuslineInput {
    #[serde(default)]
    pub model: Option<ModelInfo>,
    #[serde(default)]
    pub cost: Option<CostInfo>,
    #[serde(default)]
    pub context_window: Option<ContextWindow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CostInfo {
    #[serde(default)]
    pub total_cost_usd: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContextWindow {
    #[serde(default)]
    pub total_input_tokens: u64,
    #[serde(default)]
    pub total_output_tokens: u64,
    #[serde(default)]
    pub current_usage: Option<CurrentUsage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CurrentUsage {
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl StatuslineInput {
    fn model_name(&self) -> Option<String> {
        let model = self.model.as_ref()?;
        model
            .display_name
            .clone()
            .or_else(|| model.id.clone())
            .filter(|name| !name.trim().is_empty())
    }

    fn usage(&self) -> Option<TokenUsage> {
        let window = self.context_window.as_ref()?;
        let current = window.current_usage.as_ref();
        Some(TokenUsage {
            input: window.total_input_tokens,
            output: window.total_output_tokens,
            cache_read: current.map_or(0, |usage| usage.cache_read_input_tokens),
            cache_write: current.map_or(0, |usage| usage.cache_creation_input_tokens),
            cost_usd: self.cost.as_ref().map_or(0.0, |cost| cost.total_cost_usd),
        })
    }
}

/// Always prints something (possibly an empty line) so the status line never
/// shows an error.
pub fn run() -> Result<(), PresenceError> {
    let raw = input::read_stdin();
    let parsed: StatuslineInput = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(error = %err, "Unparsable status line input");
            println!();
            return Ok(());
        }
    };

    println!("{}", render(&parsed));

    let store = StateStore::new(&config::data_dir()?);
    store.set_usage(parsed.model_name(), parsed.usage())?;
    Ok(())
}

pub fn render(input: &StatuslineInput) -> String {
    let model = input.model_name().unwrap_or_default();
    let usage = input.usage().unwrap_or_default();
    let total = usage.total();

    if total > 0 {
        let prefix = if model.is_empty() {
            String::new()
        } else {
            format!("[{}] ", model)
        };
        format!("{}{} | {}", prefix, format_tokens(total), format_cost(usage.cost_usd))
    } else if !model.is_empty() {
        format!("[{}]", model)
    } else {
        String::new()
    }
}

/// 950 → `950`, 12_500 → `12.5k`, 1_200_000 → `1.2M`.
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1000 {
        format!("{:.1}k", count as f64 / 1000.0)
    } else {
        count.to_string()
    }
}

fn format_cost(cost: f64) -> String {
    if cost >= 0.01 {
        format!("${:.2}", cost)
    } else {
        format!("${:.3}", cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn parse(raw: &str) -> StatuslineInput {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn token_formatting() {
        assert_eq!(format_tokens(950), "950");
        assert_eq!(format_tokens(12_500), "12.5k");
        assert_eq!(format_tokens(1_200_000), "1.2M");
    }

    #[test]
    fn renders_model_tokens_and_cost() {
        let input = parse(
            r#"{"model":{"display_name":"Opus","id":"claude-opus"},
                "cost":{"total_cost_usd":0.123},
                "context_window":{"total_input_tokens":10000,"total_output_tokens":2500,
                                  "current_usage":{"cache_read_input_tokens":7}}}"#,
        );
        assert_eq!(render(&input), "[Opus] 12.5k | $0.12");
        assert_eq!(input.usage().unwrap().cache_read, 7);
    }

    #[test]
    fn renders_model_only_and_empty() {
        assert_eq!(render(&parse(r#"{"model":{"id":"claude-x"}}"#)), "[claude-x]");
        assert_eq!(render(&parse("{}")), "");
        assert_eq!(format_cost(0.004), "$0.004");
    }

    #[test]
    fn usage_merges_into_existing_session_only() {
        let temp = tempdir().unwrap();
        let store = StateStore::new(temp.path());
        let input = parse(
            r#"{"model":{"display_name":"Sonnet"},
                "context_window":{"total_input_tokens":5,"total_output_tokens":6}}"#,
        );

        assert!(store
            .set_usage(input.model_name(), input.usage())
            .unwrap()
            .is_none());

        store.create("proj", Utc::now()).unwrap();
        let record = store
            .set_usage(input.model_name(), input.usage())
            .unwrap()
            .unwrap();
        assert_eq!(record.model.as_deref(), Some("Sonnet"));
        assert_eq!(record.usage.unwrap().total(), 11);
    }
}

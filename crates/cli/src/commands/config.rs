use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procureflow_core::config::{AppConfig, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE};
use procureflow_core::currency::format_currency;
use toml::Value;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "config";

pub fn run() -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    CommandResult::success(COMMAND, render(&config))
}

/// One line per effective setting, annotated with where the value came from.
pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "pricing.tax_rate",
        &config.pricing.tax_rate.to_string(),
        source("pricing.tax_rate", &["PROCUREFLOW_PRICING_TAX_RATE"]),
    ));

    lines.push(render_line(
        "approvals.system_admin",
        &config.approvals.system_admin,
        source("approvals.system_admin", &["PROCUREFLOW_APPROVALS_SYSTEM_ADMIN"]),
    ));
    let departments = config
        .approvals
        .departments
        .iter()
        .map(|(department, manager)| format!("{department}={manager}"))
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(render_line(
        "approvals.departments",
        &departments,
        source("approvals.departments", &[]),
    ));
    let thresholds = config
        .approvals
        .thresholds
        .iter()
        .map(|threshold| {
            format!(
                "> {} {} ({})",
                format_currency(threshold.amount),
                threshold.approver_role,
                threshold.contact
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(render_line(
        "approvals.thresholds",
        if thresholds.is_empty() { "<none>" } else { thresholds.as_str() },
        source("approvals.thresholds", &[]),
    ));

    lines.push(render_line(
        "notifications.enabled",
        &config.notifications.enabled.to_string(),
        source("notifications.enabled", &["PROCUREFLOW_NOTIFICATIONS_ENABLED"]),
    ));
    lines.push(render_line(
        "notifications.sender",
        &config.notifications.sender,
        source("notifications.sender", &["PROCUREFLOW_NOTIFICATIONS_SENDER"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["PROCUREFLOW_LOGGING_LEVEL", "PROCUREFLOW_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["PROCUREFLOW_LOGGING_FORMAT", "PROCUREFLOW_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    // Blank values are ignored by the loader, so they must not be reported as the source.
    if let Some(env_key) =
        env_keys.iter().find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()))
    {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::approval::{
    ApprovalThreshold, ApprovalThresholdTable, Contact, DEFAULT_DEPARTMENT_MANAGERS,
    DEFAULT_SYSTEM_ADMIN, DEFAULT_THRESHOLDS,
};
use crate::pricing::DEFAULT_TAX_RATE;

pub const DEFAULT_CONFIG_FILE: &str = "procureflow.toml";
pub const NESTED_CONFIG_FILE: &str = "config/procureflow.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub pricing: PricingConfig,
    pub approvals: ApprovalsConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub tax_rate: Decimal,
}

#[derive(Clone, Debug)]
pub struct ApprovalsConfig {
    pub system_admin: String,
    pub departments: BTreeMap<String, String>,
    pub thresholds: Vec<ThresholdConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ThresholdConfig {
    pub amount: Decimal,
    pub approver_role: String,
    pub contact: String,
}

#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub sender: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub tax_rate: Option<Decimal>,
    pub system_admin: Option<String>,
    pub notifications_enabled: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig { tax_rate: DEFAULT_TAX_RATE },
            approvals: ApprovalsConfig {
                system_admin: DEFAULT_SYSTEM_ADMIN.to_string(),
                departments: DEFAULT_DEPARTMENT_MANAGERS
                    .iter()
                    .map(|(department, manager)| (department.to_string(), manager.to_string()))
                    .collect(),
                thresholds: DEFAULT_THRESHOLDS
                    .iter()
                    .map(|(amount, role, contact)| ThresholdConfig {
                        amount: Decimal::from(*amount),
                        approver_role: role.to_string(),
                        contact: contact.to_string(),
                    })
                    .collect(),
            },
            notifications: NotificationsConfig {
                enabled: true,
                sender: "procureflow@company.com".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Builds the routing table the approval router reads. Call after
    /// [`AppConfig::validate`] so contacts and amounts are known to be sane.
    pub fn threshold_table(&self) -> ApprovalThresholdTable {
        ApprovalThresholdTable::new(
            self.approvals
                .departments
                .iter()
                .map(|(department, manager)| (department.clone(), Contact::new(manager))),
            self.approvals
                .thresholds
                .iter()
                .map(|threshold| ApprovalThreshold {
                    amount: threshold.amount,
                    approver_role: threshold.approver_role.clone(),
                    contact: Contact::new(&threshold.contact),
                })
                .collect(),
            Contact::new(&self.approvals.system_admin),
        )
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(pricing) = patch.pricing {
            if let Some(tax_rate) = pricing.tax_rate {
                self.pricing.tax_rate = tax_rate;
            }
        }

        // Department and threshold tables replace the defaults wholesale so a
        // file never inherits a tier it did not declare.
        if let Some(approvals) = patch.approvals {
            if let Some(system_admin) = approvals.system_admin {
                self.approvals.system_admin = system_admin;
            }
            if let Some(departments) = approvals.departments {
                self.approvals.departments = departments;
            }
            if let Some(thresholds) = approvals.thresholds {
                self.approvals.thresholds = thresholds;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(enabled) = notifications.enabled {
                self.notifications.enabled = enabled;
            }
            if let Some(sender) = notifications.sender {
                self.notifications.sender = sender;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PROCUREFLOW_PRICING_TAX_RATE") {
            self.pricing.tax_rate = parse_decimal("PROCUREFLOW_PRICING_TAX_RATE", &value)?;
        }

        if let Some(value) = read_env("PROCUREFLOW_APPROVALS_SYSTEM_ADMIN") {
            self.approvals.system_admin = value;
        }

        if let Some(value) = read_env("PROCUREFLOW_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_bool("PROCUREFLOW_NOTIFICATIONS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PROCUREFLOW_NOTIFICATIONS_SENDER") {
            self.notifications.sender = value;
        }

        let log_level =
            read_env("PROCUREFLOW_LOGGING_LEVEL").or_else(|| read_env("PROCUREFLOW_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PROCUREFLOW_LOGGING_FORMAT").or_else(|| read_env("PROCUREFLOW_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(tax_rate) = overrides.tax_rate {
            self.pricing.tax_rate = tax_rate;
        }
        if let Some(system_admin) = overrides.system_admin {
            self.approvals.system_admin = system_admin;
        }
        if let Some(enabled) = overrides.notifications_enabled {
            self.notifications.enabled = enabled;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pricing(&self.pricing)?;
        validate_approvals(&self.approvals)?;
        validate_notifications(&self.notifications)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.tax_rate < Decimal::ZERO || pricing.tax_rate > Decimal::ONE {
        return Err(ConfigError::Validation(
            "pricing.tax_rate must be in range 0..=1 (e.g. 0.10 for 10%)".to_string(),
        ));
    }
    Ok(())
}

fn validate_approvals(approvals: &ApprovalsConfig) -> Result<(), ConfigError> {
    validate_contact("approvals.system_admin", &approvals.system_admin)?;

    if approvals.departments.is_empty() {
        return Err(ConfigError::Validation(
            "approvals.departments must map at least one department to its manager".to_string(),
        ));
    }

    let mut department_keys = HashSet::new();
    for (department, manager) in &approvals.departments {
        if department.trim().is_empty() {
            return Err(ConfigError::Validation(
                "approvals.departments contains an empty department name".to_string(),
            ));
        }
        if !department_keys.insert(department.trim().to_ascii_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "approvals.departments lists `{department}` more than once (names are case-insensitive)"
            )));
        }
        validate_contact(&format!("approvals.departments.{department}"), manager)?;
    }

    let mut amounts = HashSet::new();
    for threshold in &approvals.thresholds {
        if threshold.amount <= Decimal::ZERO {
            return Err(ConfigError::Validation(format!(
                "approvals.thresholds amount for `{}` must be greater than zero",
                threshold.approver_role
            )));
        }
        if !amounts.insert(threshold.amount.normalize()) {
            return Err(ConfigError::Validation(format!(
                "approvals.thresholds declares amount {} more than once",
                threshold.amount
            )));
        }
        if threshold.approver_role.trim().is_empty() {
            return Err(ConfigError::Validation(
                "approvals.thresholds approver_role must not be empty".to_string(),
            ));
        }
        validate_contact(
            &format!("approvals.thresholds[{}].contact", threshold.approver_role),
            &threshold.contact,
        )?;
    }

    Ok(())
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    if notifications.enabled {
        validate_contact("notifications.sender", &notifications.sender)?;
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_contact(key: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    let looks_like_address = value
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
        .unwrap_or(false);
    if !looks_like_address {
        return Err(ConfigError::Validation(format!(
            "{key} must be an email address like `name@company.com`, got `{value}`"
        )));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    pricing: Option<PricingPatch>,
    approvals: Option<ApprovalsPatch>,
    notifications: Option<NotificationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    tax_rate: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalsPatch {
    system_admin: Option<String>,
    departments: Option<BTreeMap<String, String>>,
    thresholds: Option<Vec<ThresholdConfig>>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    enabled: Option<bool>,
    sender: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

pub mod config;
pub mod price;
pub mod route;
pub mod submit;

use std::fs;
use std::path::Path;

use procureflow_core::config::{AppConfig, LoadOptions};
use procureflow_core::domain::requisition::{DraftDocument, RequisitionDraft};
use procureflow_core::errors::{ApplicationError, DomainError, InterfaceError};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INPUT: u8 = 3;
pub const EXIT_DOMAIN: u8 = 4;
pub const EXIT_INTERNAL: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            user_message: None,
            correlation_id: None,
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: &impl Serialize,
    ) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(
                    command,
                    "serialization",
                    format!("could not serialize command result: {error}"),
                    EXIT_INTERNAL,
                );
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            user_message: None,
            correlation_id: None,
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            user_message: None,
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn domain_failure(command: &str, error: &DomainError, correlation_id: &str) -> Self {
        Self::application_failure(command, &ApplicationError::from(error.clone()), correlation_id)
    }

    /// Failures from the core carry the interface view of the error: a
    /// user-safe message and the correlation id of the run.
    pub fn application_failure(
        command: &str,
        error: &ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let (error_class, exit_code) = match error {
            ApplicationError::Domain(domain) => (domain_error_class(domain), EXIT_DOMAIN),
            ApplicationError::Notification(_) => ("notification", EXIT_INTERNAL),
            ApplicationError::Configuration(_) => ("config_validation", EXIT_CONFIG),
        };
        let interface: InterfaceError = error.clone().into_interface(correlation_id);

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: error.to_string(),
            user_message: Some(interface.user_message().to_string()),
            correlation_id: Some(interface.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

pub fn domain_error_class(error: &DomainError) -> &'static str {
    match error {
        DomainError::InvalidInput { .. } => "invalid_input",
        DomainError::UnknownDepartment { .. } => "unknown_department",
        DomainError::EmptyRequisition => "empty_requisition",
        DomainError::ItemNotFound { .. } => "item_not_found",
        DomainError::InvalidRequisitionTransition { .. } => "invalid_transition",
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })
}

pub(crate) fn read_draft(
    command: &str,
    path: &Path,
    correlation_id: &str,
) -> Result<RequisitionDraft, CommandResult> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CommandResult::failure(
            command,
            "input_read",
            format!("could not read draft `{}`: {error}", path.display()),
            EXIT_INPUT,
        )
    })?;

    let document: DraftDocument = serde_json::from_str(&raw).map_err(|error| {
        CommandResult::failure(
            command,
            "input_parse",
            format!("draft `{}` is not valid requisition JSON: {error}", path.display()),
            EXIT_INPUT,
        )
    })?;

    RequisitionDraft::try_from(document)
        .map_err(|error| CommandResult::domain_failure(command, &error, correlation_id))
}

pub(crate) fn correlation_id(command: &str) -> String {
    format!("cli-{command}-{}", Uuid::new_v4())
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

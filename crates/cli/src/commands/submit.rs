use std::path::Path;

use chrono::Utc;
use procureflow_core::currency::format_currency;
use procureflow_core::errors::DomainError;
use procureflow_core::submission::{DefaultSubmissionService, SubmissionRequest};

use crate::commands::{correlation_id, load_config, read_draft, CommandResult};

const COMMAND: &str = "submit";

pub fn run(path: &Path, requestor: &str) -> CommandResult {
    let correlation_id = correlation_id(COMMAND);
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let draft = match read_draft(COMMAND, path, &correlation_id) {
        Ok(draft) => draft,
        Err(failure) => return failure,
    };

    let requestor = requestor.trim();
    if requestor.is_empty() {
        let error = DomainError::invalid_input("requestor", "requestor is required");
        return CommandResult::domain_failure(COMMAND, &error, &correlation_id);
    }

    let service = match DefaultSubmissionService::from_config(&config) {
        Ok(service) => service,
        Err(error) => return CommandResult::application_failure(COMMAND, &error, &correlation_id),
    };

    let request =
        SubmissionRequest { requestor, correlation_id: &correlation_id, submitted_at: Utc::now() };
    match service.submit(draft, request) {
        Ok(receipt) => {
            let message = format!(
                "requisition {} submitted for {} ({} approver(s))",
                receipt.requisition.id,
                format_currency(receipt.requisition.totals.grand_total),
                receipt.approval_chain.len()
            );
            CommandResult::success_with_data(COMMAND, message, &receipt)
        }
        Err(error) => CommandResult::application_failure(COMMAND, &error, &correlation_id),
    }
}

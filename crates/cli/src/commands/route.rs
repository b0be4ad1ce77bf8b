use procureflow_core::approvals::{
    ApprovalChain, ApprovalRouter, SharedThresholdTable, ThresholdApprovalRouter,
};
use procureflow_core::currency::{format_currency, try_parse_currency};
use procureflow_core::errors::DomainError;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::commands::{correlation_id, load_config, CommandResult};

const COMMAND: &str = "route";

#[derive(Debug, Serialize)]
struct RouteReport<'a> {
    department: &'a str,
    amount: Decimal,
    formatted_amount: String,
    approval_chain: &'a ApprovalChain,
}

pub fn run(department: &str, amount: &str) -> CommandResult {
    let correlation_id = correlation_id(COMMAND);
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    // The amount is operator input, so reject anything that is not a number
    // instead of silently routing a zero.
    let Some(amount) = try_parse_currency(amount) else {
        let error = DomainError::invalid_input(
            "amount",
            format!("`{amount}` is not a currency amount (e.g. 1250.00 or RM1,250.00)"),
        );
        return CommandResult::domain_failure(COMMAND, &error, &correlation_id);
    };
    if amount < Decimal::ZERO {
        let error = DomainError::invalid_input("amount", "amount must not be negative");
        return CommandResult::domain_failure(COMMAND, &error, &correlation_id);
    }

    let router = ThresholdApprovalRouter::new(SharedThresholdTable::new(config.threshold_table()));
    let chain = match router.route(department, amount) {
        Ok(chain) => chain,
        Err(error) => return CommandResult::domain_failure(COMMAND, &error, &correlation_id),
    };

    info!(
        event_name = "cli.requisition.routed",
        correlation_id = %correlation_id,
        department,
        approvers = chain.len(),
        "approval chain resolved"
    );

    let report = RouteReport {
        department: department.trim(),
        amount,
        formatted_amount: format_currency(amount),
        approval_chain: &chain,
    };
    CommandResult::success_with_data(
        COMMAND,
        format!("{} approver(s) for {}", chain.len(), report.formatted_amount),
        &report,
    )
}

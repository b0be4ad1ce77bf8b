use std::path::Path;

use procureflow_core::currency::format_currency;
use procureflow_core::domain::requisition::LineItem;
use procureflow_core::pricing::{ComputedTotals, PricingEngine, PricingResult, StandardPricingEngine};
use serde::Serialize;
use tracing::info;

use crate::commands::{correlation_id, load_config, read_draft, CommandResult};

const COMMAND: &str = "price";

#[derive(Debug, Serialize)]
struct PriceReport<'a> {
    items: &'a [LineItem],
    pricing: &'a PricingResult,
    formatted: FormattedTotals,
}

#[derive(Debug, Serialize)]
struct FormattedTotals {
    subtotal: String,
    tax_amount: String,
    grand_total: String,
}

impl From<&ComputedTotals> for FormattedTotals {
    fn from(totals: &ComputedTotals) -> Self {
        Self {
            subtotal: format_currency(totals.subtotal),
            tax_amount: format_currency(totals.tax_amount),
            grand_total: format_currency(totals.grand_total),
        }
    }
}

pub fn run(path: &Path) -> CommandResult {
    let correlation_id = correlation_id(COMMAND);
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let draft = match read_draft(COMMAND, path, &correlation_id) {
        Ok(draft) => draft,
        Err(failure) => return failure,
    };

    let engine = StandardPricingEngine::new(config.pricing.tax_rate);
    let pricing = match engine.price(draft.items()) {
        Ok(pricing) => pricing,
        Err(error) => return CommandResult::domain_failure(COMMAND, &error, &correlation_id),
    };

    info!(
        event_name = "cli.requisition.priced",
        correlation_id = %correlation_id,
        item_count = draft.items().len(),
        grand_total = %pricing.totals.grand_total,
        "draft priced"
    );

    let report = PriceReport {
        items: draft.items(),
        pricing: &pricing,
        formatted: FormattedTotals::from(&pricing.totals),
    };
    CommandResult::success_with_data(
        COMMAND,
        format!("grand total {}", report.formatted.grand_total),
        &report,
    )
}

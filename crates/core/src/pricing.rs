use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::currency::CURRENCY_CODE;
use crate::domain::requisition::LineItem;
use crate::errors::DomainError;

/// 10%, applied to the subtotal of every requisition unless configured otherwise.
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

const OUTPUT_SCALE: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub currency: String,
}

impl ComputedTotals {
    pub fn zero() -> Self {
        Self {
            subtotal: to_output(Decimal::ZERO),
            tax_amount: to_output(Decimal::ZERO),
            grand_total: to_output(Decimal::ZERO),
            currency: CURRENCY_CODE.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub totals: ComputedTotals,
    pub tax_rate: Decimal,
    pub steps: Vec<PricingTraceStep>,
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, items: &[LineItem]) -> Result<PricingResult, DomainError>;
}

#[derive(Clone, Debug)]
pub struct StandardPricingEngine {
    tax_rate: Decimal,
}

impl StandardPricingEngine {
    pub fn new(tax_rate: Decimal) -> Self {
        Self { tax_rate }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }
}

impl Default for StandardPricingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TAX_RATE)
    }
}

impl PricingEngine for StandardPricingEngine {
    fn price(&self, items: &[LineItem]) -> Result<PricingResult, DomainError> {
        compute_totals_with_trace(items, self.tax_rate)
    }
}

/// `quantity x unit_price` at full precision, or `None` when the product does
/// not fit a `Decimal`. Quantities below one contribute nothing rather than a
/// negative amount.
pub fn line_amount(quantity: i64, unit_price: Decimal) -> Option<Decimal> {
    if quantity < 1 {
        return Some(Decimal::ZERO);
    }
    unit_price.checked_mul(Decimal::from(quantity))
}

/// Line items only exist with an in-range total, so this cannot overflow.
pub fn compute_line_total(item: &LineItem) -> Decimal {
    item.line_total()
}

pub fn compute_totals(items: &[LineItem], tax_rate: Decimal) -> Result<ComputedTotals, DomainError> {
    compute_totals_with_trace(items, tax_rate).map(|result| result.totals)
}

pub fn compute_totals_with_trace(
    items: &[LineItem],
    tax_rate: Decimal,
) -> Result<PricingResult, DomainError> {
    validate_tax_rate(tax_rate)?;
    for (index, item) in items.iter().enumerate() {
        validate_item(index, item)?;
    }

    let mut steps = Vec::with_capacity(items.len() + 3);
    let mut subtotal = Decimal::ZERO;
    for item in items {
        let line_total = compute_line_total(item);
        subtotal = subtotal.checked_add(line_total).ok_or_else(|| out_of_range("subtotal"))?;
        steps.push(PricingTraceStep {
            stage: format!("line:{}", item.id),
            detail: format!("{} x {}", item.quantity().max(0), item.unit_price()),
            amount: line_total,
        });
    }

    // Rounding happens once, on the way out; the tax is derived from the
    // unrounded subtotal.
    let tax_amount = subtotal.checked_mul(tax_rate).ok_or_else(|| out_of_range("tax_amount"))?;
    let grand_total =
        subtotal.checked_add(tax_amount).ok_or_else(|| out_of_range("grand_total"))?;

    steps.push(PricingTraceStep {
        stage: "subtotal".to_string(),
        detail: "sum(quantity * unit_price)".to_string(),
        amount: subtotal,
    });
    steps.push(PricingTraceStep {
        stage: "tax".to_string(),
        detail: format!("subtotal * {tax_rate}"),
        amount: tax_amount,
    });
    steps.push(PricingTraceStep {
        stage: "grand_total".to_string(),
        detail: "subtotal + tax".to_string(),
        amount: grand_total,
    });

    Ok(PricingResult {
        totals: ComputedTotals {
            subtotal: to_output(subtotal),
            tax_amount: to_output(tax_amount),
            grand_total: to_output(grand_total),
            currency: CURRENCY_CODE.to_string(),
        },
        tax_rate,
        steps,
    })
}

/// Half-up rounding to two fraction digits, always carrying scale 2.
pub fn to_output(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(OUTPUT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(OUTPUT_SCALE);
    rounded
}

pub(crate) fn out_of_range(field: impl Into<String>) -> DomainError {
    DomainError::invalid_input(field, "amount exceeds the supported range")
}

fn validate_tax_rate(tax_rate: Decimal) -> Result<(), DomainError> {
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
        return Err(DomainError::invalid_input("tax_rate", "tax rate must be within 0..=1"));
    }
    Ok(())
}

fn validate_item(index: usize, item: &LineItem) -> Result<(), DomainError> {
    if item.quantity() < 0 {
        return Err(DomainError::invalid_input(
            format!("items[{index}].quantity"),
            "quantity must not be negative",
        ));
    }
    if item.unit_price() < Decimal::ZERO {
        return Err(DomainError::invalid_input(
            format!("items[{index}].unit_price"),
            "unit price must not be negative",
        ));
    }
    Ok(())
}
